//! Secure-mode credential file.

use crate::flasher::{Error, Result};
use std::{fmt, path::Path};

/// Number of `-s` parameters the unlock sequence expects.
pub const CREDENTIAL_COUNT: usize = 8;

/// The eight password parameters passed verbatim to `dslite`, in file order.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(Vec<String>);

impl Credentials {
    /// Reads a credential file.
    ///
    /// # Errors
    ///
    /// [`Error::CredentialSourceInvalid`] if the file cannot be read or does
    /// not contain exactly eight non-empty lines.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::CredentialSourceInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    /// Parses credential text; `source` only labels errors.
    pub fn parse(text: &str, source: &Path) -> Result<Self> {
        let params: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        if params.len() != CREDENTIAL_COUNT {
            return Err(Error::CredentialSourceInvalid {
                path: source.to_path_buf(),
                reason: format!(
                    "expected {} parameters, found {}",
                    CREDENTIAL_COUNT,
                    params.len()
                ),
            });
        }
        Ok(Self(params))
    }

    /// Parameters in file order.
    pub fn params(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials(<{} redacted>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eight() -> String {
        (0..8)
            .map(|i| format!("Z1_PASSWORD{i}=0x{:08X}\n", 0xFFFF_0000u32 + i))
            .collect()
    }

    #[test]
    fn parses_eight_lines_in_order() {
        let text = format!("\n{}\n\n", eight());
        let creds = Credentials::parse(&text, Path::new("password.txt")).unwrap();
        assert_eq!(creds.params().len(), 8);
        assert_eq!(creds.params()[0], "Z1_PASSWORD0=0xFFFF0000");
        assert_eq!(creds.params()[7], "Z1_PASSWORD7=0xFFFF0007");
    }

    #[test]
    fn wrong_count_is_invalid() {
        let seven: String = eight().lines().take(7).map(|l| format!("{l}\n")).collect();
        let nine = format!("{}EXTRA=1\n", eight());
        for text in [seven, nine, String::new()] {
            assert!(matches!(
                Credentials::parse(&text, Path::new("password.txt")),
                Err(Error::CredentialSourceInvalid { .. })
            ));
        }
    }

    #[test]
    fn missing_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Credentials::load(&dir.path().join("password.txt")),
            Err(Error::CredentialSourceInvalid { .. })
        ));
    }

    #[test]
    fn debug_does_not_leak() {
        let creds = Credentials::parse(&eight(), Path::new("p")).unwrap();
        assert!(!format!("{creds:?}").contains("PASSWORD"));
    }
}
