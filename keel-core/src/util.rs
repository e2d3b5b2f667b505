use std::fmt::{self, Display, Formatter};

/// Formats at most the first 497 bytes of a query, appending `...` when cut.
#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        $crate::TruncateLong(::std::convert::AsRef::<str>::as_ref(&$query))
    };
}

#[doc(hidden)]
pub struct TruncateLong<'a>(pub &'a str);

impl Display for TruncateLong<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut end = self.0.len().min(497);
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        f.write_str(self.0[..end].trim_end())?;
        if self.0.len() > end {
            f.write_str("...")?;
        }
        Ok(())
    }
}

/// Hides the credentials of a `key=value;...` connection string before it reaches a log.
pub fn redact_connection_string(connection_string: &str) -> String {
    const SECRETS: [&str; 3] = ["pwd", "password", "secret"];
    connection_string
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, _)) if SECRETS.contains(&key.trim().to_ascii_lowercase().as_str()) => {
                format!("{}=***", key)
            }
            _ => part.to_owned(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
