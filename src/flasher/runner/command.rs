//! `dslite` command assembly.
//!
//! Argument order is part of the tool's contract: the unlock actions must
//! precede the password parameters, and the password parameters must stay in
//! credential-file order.

use super::Credentials;
use crate::flasher::Result;
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Fixed secure-mode arguments, placed between the image and the passwords.
const SECURE_ARGS: [&str; 12] = [
    "-s",
    "VerifyAfterProgramLoad=No verification",
    "-s",
    "FlashResetOnOperation=false",
    "-b",
    "Z1Unlock",
    "-a",
    "Z1Unlock",
    "-a",
    "Z1PasswordProgram",
    "-a",
    "Z1GRABEXEONLYProgram",
];

/// Builds the ordered `dslite` argument list.
///
/// `flash -c <config> -e -f -v <image>`, followed in secure mode by the fixed
/// unlock arguments and one `-s <param>` pair per credential.
pub fn flash_args(config: &Path, image: &Path, credentials: Option<&Credentials>) -> Vec<String> {
    let mut args = vec![
        "flash".to_string(),
        "-c".to_string(),
        config.display().to_string(),
        "-e".to_string(),
        "-f".to_string(),
        "-v".to_string(),
        image.display().to_string(),
    ];

    if let Some(credentials) = credentials {
        args.extend(SECURE_ARGS.iter().map(|s| s.to_string()));
        for param in credentials.params() {
            args.push("-s".to_string());
            args.push(param.clone());
        }
    }

    args
}

/// A ready-to-run flashing command.
#[derive(Clone)]
pub struct FlashCommand {
    program: PathBuf,
    args: Vec<String>,
    secret_args: usize,
}

impl FlashCommand {
    /// Program to execute.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments, in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Shows the command line with credential values masked.
impl fmt::Display for FlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        let visible = self.args.len() - self.secret_args;
        for (i, arg) in self.args.iter().enumerate() {
            // Secret values are every second argument of the trailing block.
            if i >= visible && (i - visible) % 2 == 1 {
                f.write_str(" ***")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlashCommand({self})")
    }
}

/// Produces [`FlashCommand`]s for one tool and credential file.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    tool: PathBuf,
    credential_file: PathBuf,
}

impl CommandBuilder {
    /// Creates a builder for `tool`, reading secure-mode passwords from
    /// `credential_file` when needed.
    pub fn new(tool: impl Into<PathBuf>, credential_file: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            credential_file: credential_file.into(),
        }
    }

    /// Builds the command for one attempt.
    ///
    /// The credential file is read on every secure build so edits take
    /// effect without a restart.
    ///
    /// # Errors
    ///
    /// [`Error::CredentialSourceInvalid`](crate::flasher::Error::CredentialSourceInvalid)
    /// in secure mode when the credential file is unusable.
    pub fn build(&self, config: &Path, image: &Path, secure: bool) -> Result<FlashCommand> {
        let credentials = if secure {
            Some(Credentials::load(&self.credential_file)?)
        } else {
            None
        };
        let args = flash_args(config, image, credentials.as_ref());
        let secret_args = credentials.map_or(0, |c| c.params().len() * 2);

        Ok(FlashCommand {
            program: self.tool.clone(),
            args,
            secret_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flasher::Error;

    fn write_credentials(dir: &Path) -> PathBuf {
        let path = dir.join("password.txt");
        let text: String = (0..8).map(|i| format!("Z1_PSWD{i}=0x{i:08X}\n")).collect();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn plain_mode_arguments() {
        let args = flash_args(
            Path::new("generated_ccxml/channel_1_serial_ABC.ccxml"),
            Path::new("image/app.out"),
            None,
        );
        assert_eq!(
            args,
            vec![
                "flash",
                "-c",
                "generated_ccxml/channel_1_serial_ABC.ccxml",
                "-e",
                "-f",
                "-v",
                "image/app.out",
            ]
        );
    }

    #[test]
    fn secure_mode_appends_unlock_then_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let builder = CommandBuilder::new("dslite", write_credentials(dir.path()));

        let cmd = builder
            .build(Path::new("c.ccxml"), Path::new("app.out"), true)
            .unwrap();
        let args = cmd.args();

        assert_eq!(args.len(), 7 + SECURE_ARGS.len() + 16);
        assert_eq!(&args[7..19], SECURE_ARGS.map(String::from).as_slice());
        for i in 0..8 {
            assert_eq!(args[19 + 2 * i], "-s");
            assert_eq!(args[20 + 2 * i], format!("Z1_PSWD{i}=0x{i:08X}"));
        }
    }

    #[test]
    fn secure_mode_with_bad_credentials_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("password.txt");
        std::fs::write(&path, "ONLY=1\n").unwrap();
        let builder = CommandBuilder::new("dslite", &path);

        assert!(matches!(
            builder.build(Path::new("c.ccxml"), Path::new("app.out"), true),
            Err(Error::CredentialSourceInvalid { .. })
        ));
        // Plain mode never reads the file.
        assert!(
            builder
                .build(Path::new("c.ccxml"), Path::new("app.out"), false)
                .is_ok()
        );
    }

    #[test]
    fn display_masks_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let builder = CommandBuilder::new("dslite", write_credentials(dir.path()));
        let cmd = builder
            .build(Path::new("c.ccxml"), Path::new("app.out"), true)
            .unwrap();

        let shown = cmd.to_string();
        assert!(shown.starts_with("dslite flash -c c.ccxml -e -f -v app.out -s VerifyAfterProgramLoad"));
        assert!(!shown.contains("Z1_PSWD"));
        assert_eq!(shown.matches(" ***").count(), 8);
    }
}
