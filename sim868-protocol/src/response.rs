use crate::error::{ModemError, Result};
use crate::gnss::{GnssField, GnssFix, Number};
use crate::protocol::Tokens;
use crate::sms::{SmsRecord, StorageStats};

/// Prefix of the `AT+CGNSINF` report line.
pub const GNSS_INFO_PREFIX: &str = "+CGNSINF: ";
/// Prefix of the `AT+CMGR` header line.
pub const SMS_READ_PREFIX: &str = "+CMGR: ";
/// Prefix of the `AT+CPMS` counters line.
pub const SMS_STORAGE_PREFIX: &str = "+CPMS: ";

/// `+CMS ERROR: 321`, invalid memory index. Some firmware answers a read of
/// an empty slot with it instead of a bare `OK`.
pub const SMS_INVALID_INDEX: &str = "+CMS ERROR: 321";

/// Separator between the quoted fields of a `+CMGR` header.
const SMS_META_SEPARATOR: &str = "\",\"";

/// Fail with [`ModemError::CommandFailed`] when the response ended in an error.
pub fn check_status(tokens: &Tokens, command: &str, frame: &str) -> Result<()> {
    if tokens.is_error() {
        return Err(ModemError::CommandFailed {
            command: command.to_string(),
            frame: frame.to_string(),
        });
    }
    Ok(())
}

/// Whether a `+CMGR` response says the slot holds no message.
pub fn is_empty_slot(tokens: &Tokens) -> bool {
    tokens.is_error() && tokens.status_line.trim() == SMS_INVALID_INDEX
}

fn first_line<'a>(tokens: &'a Tokens, context: &str) -> Result<&'a str> {
    tokens
        .first()
        .ok_or_else(|| ModemError::decode(context, "response has no data line"))
}

/// Decode a `+CGNSINF` report into a [`GnssFix`].
///
/// Empty fields are absent. Missing trailing fields are absent too and extra
/// ones are ignored. A field that is neither an integer nor a float is an error.
pub fn decode_gnss(tokens: &Tokens) -> Result<GnssFix> {
    let line = first_line(tokens, "GNSS report")?;
    let values = line.strip_prefix(GNSS_INFO_PREFIX).unwrap_or(line);

    let mut fix = GnssFix::default();
    for (field, raw) in GnssField::ALL.iter().zip(values.split(',')) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let value = Number::parse(raw).ok_or_else(|| {
            ModemError::decode(format!("GNSS field {field}"), format!("{raw:?} is not a number"))
        })?;
        fix.set(*field, Some(value));
    }
    Ok(fix)
}

/// Decode a `+CMGR` response into the message at `nth`.
///
/// Returns `None` when the slot holds no message (no text line in the response).
pub fn decode_sms(tokens: &Tokens, nth: usize) -> Result<Option<SmsRecord>> {
    let (Some(header), Some(body)) = (tokens.lines.first(), tokens.lines.get(1)) else {
        return Ok(None);
    };

    let meta = header.strip_prefix(SMS_READ_PREFIX).unwrap_or(header);
    let mut parts: Vec<&str> = meta.split(SMS_META_SEPARATOR).collect();
    if parts.len() < 4 {
        return Err(ModemError::decode(
            format!("SMS #{nth} header"),
            format!("expected 4 fields in {header:?}"),
        ));
    }
    // The third field (alphanumeric sender name) is always blank on this modem.
    parts.remove(2);

    let unquote = |s: &str| s.trim_matches('"').to_string();
    Ok(Some(SmsRecord {
        source: unquote(parts[0]),
        sender: unquote(parts[1]),
        timestamp: unquote(parts[2]),
        body: unquote(body),
        index: nth,
    }))
}

/// Decode a `+CPMS` response into the counters of the first store.
///
/// Accepts both `+CPMS: 3,50,...` and the named form `+CPMS: "SM",3,50,...`.
pub fn decode_storage(tokens: &Tokens) -> Result<StorageStats> {
    let line = first_line(tokens, "storage counters")?;
    let counters = line.strip_prefix(SMS_STORAGE_PREFIX).unwrap_or(line);

    let mut fields = counters.split(',').map(str::trim).peekable();
    if fields.peek().is_some_and(|f| f.starts_with('"')) {
        fields.next();
    }

    let mut next_count = |name: &str| -> Result<u32> {
        let raw = fields
            .next()
            .ok_or_else(|| ModemError::decode("storage counters", format!("missing {name}")))?;
        raw.parse::<u32>().map_err(|_| {
            ModemError::decode("storage counters", format!("{name} {raw:?} is not a count"))
        })
    };

    let used = next_count("used")?;
    let capacity = next_count("capacity")?;
    Ok(StorageStats { used, capacity })
}
