// src/utils/mod.rs
use crate::error::RouterError;
use log::info;
use std::str::FromStr;

pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = log::LevelFilter::from_str(level).unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

/// 10^exp as an integer, `None` on overflow.
pub fn ten_pow(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

/// Parses a raw integer amount in the smallest denomination unit.
pub fn parse_amount(raw: &str) -> Result<u128, RouterError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(RouterError::InvalidAmount(format!("amount must be positive, got {}", trimmed)));
    }
    let amount = trimmed
        .parse::<u128>()
        .map_err(|e| RouterError::InvalidAmount(format!("'{}' is not an integer amount: {}", trimmed, e)))?;
    if amount == 0 {
        return Err(RouterError::InvalidAmount("amount must be greater than zero".to_string()));
    }
    Ok(amount)
}
