use std::fmt;

/// Environment variable holding the Telegram bot token.
pub const TOKEN_VAR: &str = "TG_TOKEN";
/// Environment variable holding the health listener port.
pub const PORT_VAR: &str = "PORT";
/// Environment variable holding the comma-separated currency codes.
pub const CURRENCIES_VAR: &str = "CURRENCIES";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CURRENCY: &str = "USD";

/// Errors that can occur when reading configuration from the environment.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    MissingVar { var: &'static str, hint: &'static str },
    /// A variable is set but its value is unusable.
    Validation { var: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar { var, hint } => {
                write!(f, "{var} is not set: {hint}")
            }
            Self::Validation { var, reason } => {
                write!(f, "invalid {var}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process configuration, read once at startup and immutable afterwards.
pub struct Config {
    /// Telegram bot token from @BotFather.
    pub bot_token: String,
    /// Port the health listener binds to.
    pub port: u16,
    /// Currency codes to report, in display order.
    pub currencies: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup(TOKEN_VAR).ok_or(ConfigError::MissingVar {
            var: TOKEN_VAR,
            hint: "export the bot token issued by @BotFather",
        })?;

        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Validation {
                var: TOKEN_VAR,
                reason: "token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            });
        }

        let port = match lookup(PORT_VAR) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Validation {
                var: PORT_VAR,
                reason: format!("'{raw}' is not a valid port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let currencies = match lookup(CURRENCIES_VAR) {
            Some(raw) => {
                let codes: Vec<String> = raw
                    .split(',')
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty())
                    .collect();
                if codes.is_empty() {
                    return Err(ConfigError::Validation {
                        var: CURRENCIES_VAR,
                        reason: format!("'{raw}' contains no currency codes"),
                    });
                }
                codes
            }
            None => vec![DEFAULT_CURRENCY.to_string()],
        };

        Ok(Self {
            bot_token,
            port,
            currencies,
        })
    }
}
