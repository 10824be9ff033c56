use std::{env, path::PathBuf};

/// Configuration directory name under `~/.config`
pub const CONFIG_DIR_NAME: &str = "aws-op";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config";

/// Environment variable overriding the configuration file location
pub const CONFIG_FILE_ENV: &str = "AWS_OP_CONFIG_FILE";

/// 1Password tag marking AWS credential items
pub const DEFAULT_TAG: &str = "aws";

/// File the exported variables are written to
pub const DEFAULT_OUTPUT_FILE: &str = ".credenv";

/// 1Password CLI executable
pub const DEFAULT_OP_PATH: &str = "op";

/// Ignore-list file maintained next to the output file
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Provider name attached to the static credentials handed to the SDK
pub const PROVIDER_NAME: &str = "aws-op";

/// Item field labels
pub const ACCESS_KEY_ID_LABEL: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY_LABEL: &str = "aws_secret_access_key";
pub const MFA_SERIAL_LABEL: &str = "mfa_serial";

/// Names of the exported environment variables
pub mod vars {
    pub const OP_ID: &str = "AWS_OP_ID";
    pub const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
    pub const SESSION_EXPIRATION: &str = "AWS_SESSION_EXPIRATION";
    pub const ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
    pub const MFA_DEVICE_ARN: &str = "AWS_MFA_DEVICE_ARN";
    pub const VAULT: &str = "AWS_VAULT";
}

/// Get the aws-op config file path
/// Respects AWS_OP_CONFIG_FILE environment variable if set
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    // ~/.config on every platform, like most CLI tools
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    })
}
