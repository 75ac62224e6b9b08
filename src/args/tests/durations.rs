use super::*;

#[test]
fn parse_duration_units() -> AppResult<()> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("30", Duration::from_secs(30)),
        ("30s", Duration::from_secs(30)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3_600)),
    ];
    for (raw, expected) in cases {
        let parsed = parse_duration_arg(raw)?;
        if parsed != expected {
            return Err(AppError::validation(format!(
                "'{}' parsed as {:?}, expected {:?}",
                raw, parsed, expected
            )));
        }
    }
    Ok(())
}

#[test]
fn parse_duration_rejects_bad_input() -> AppResult<()> {
    for raw in ["", "0s", "abc", "10d", "ms"] {
        if parse_duration_arg(raw).is_ok() {
            return Err(AppError::validation(format!(
                "Expected Err for duration '{}'",
                raw
            )));
        }
    }
    Ok(())
}

#[test]
fn parse_duration_overflow() -> AppResult<()> {
    match parse_duration_arg("18446744073709551615h") {
        Err(AppError::Validation(crate::error::ValidationError::DurationOverflow)) => Ok(()),
        other => Err(AppError::validation(format!(
            "Expected overflow, got {:?}",
            other
        ))),
    }
}
