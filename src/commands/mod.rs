use std::io::{BufRead, Write};

use color_eyre::eyre::{Result, WrapErr};

pub(crate) mod auth;
pub(crate) mod check_order;
pub(crate) mod cleanup;
pub(crate) mod stats;
pub(crate) mod sync;

/// Print `message` and read one trimmed line from stdin.
pub(crate) fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush().wrap_err("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .wrap_err("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}
