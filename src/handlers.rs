//! Inbound command and button handling.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Update, UpdateKind};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info};

use crate::dispatch::{Dispatcher, TelegramSender};
use crate::rates::RateClient;

const ABOUT_TEXT: &str = "ℹ️ I report the official exchange rates published by the \
National Bank of the Republic of Belarus.\n\n\
/rate — current rates\n\
/start — welcome message";

#[derive(BotCommands, Clone, Copy, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Welcome message plus the current rates.
    Start,
    /// Current rates only.
    Rate,
}

/// Recognized inline keyboard button presses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CallbackAction {
    ShowRates,
    About,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "get_rates" | "refresh_rates" => Some(Self::ShowRates),
            "about" => Some(Self::About),
            _ => None,
        }
    }
}

fn rates_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![
            InlineKeyboardButton::callback("🔄 Refresh", "refresh_rates"),
            InlineKeyboardButton::callback("💱 Rates", "get_rates"),
        ],
        vec![InlineKeyboardButton::callback("ℹ️ About", "about")],
    ])
}

fn welcome_text(first_name: &str) -> String {
    format!(
        "Hi, {first_name}! 👋\nI track the official NBRB exchange rates.\n\n\
         Use /rate any time to get the current rate."
    )
}

/// Routes inbound updates to their handlers.
///
/// Handlers run one at a time, in platform-delivered order; every handled
/// event produces exactly one outbound message through the dispatcher.
pub struct EventRouter {
    bot: Bot,
    bot_username: String,
    dispatcher: Dispatcher<TelegramSender>,
    rates: RateClient,
    currencies: Vec<String>,
}

impl EventRouter {
    pub fn new(bot: Bot, bot_username: String, rates: RateClient, currencies: Vec<String>) -> Self {
        let dispatcher = Dispatcher::new(TelegramSender::new(bot.clone()));
        Self {
            bot,
            bot_username,
            dispatcher,
            rates,
            currencies,
        }
    }

    pub async fn route(&self, update: Update) {
        match update.kind {
            UpdateKind::Message(msg) => self.handle_message(msg).await,
            UpdateKind::CallbackQuery(query) => self.handle_callback(query).await,
            _ => {}
        }
    }

    async fn handle_message(&self, msg: Message) {
        let Some(text) = msg.text() else { return };
        let Ok(command) = Command::parse(text, &self.bot_username) else {
            debug!("Ignoring non-command message in chat {}", msg.chat.id);
            return;
        };

        let chat_id = msg.chat.id.0;
        info!("{command:?} from chat {chat_id}");

        let rates = self.rates.rate_message(&self.currencies).await;
        let reply = match command {
            Command::Start => {
                let first_name = msg
                    .from
                    .as_ref()
                    .map(|u| u.first_name.as_str())
                    .unwrap_or("there");
                format!("{}\n\n{rates}", welcome_text(first_name))
            }
            Command::Rate => rates,
        };

        self.dispatcher
            .send(chat_id, &reply, Some(rates_keyboard()))
            .await;
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        let _ = self.bot.answer_callback_query(query.id.clone()).await;

        let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
            return;
        };
        let Some(message) = query.message else { return };
        let chat_id = message.chat().id;
        info!("{action:?} button from chat {chat_id}");

        // Best-effort cleanup of the message the button was attached to.
        if let Err(e) = self.bot.delete_message(chat_id, message.id()).await {
            debug!("Could not delete message {}: {e}", message.id().0);
        }

        let reply = match action {
            CallbackAction::ShowRates => self.rates.rate_message(&self.currencies).await,
            CallbackAction::About => ABOUT_TEXT.to_string(),
        };

        self.dispatcher
            .send(chat_id.0, &reply, Some(rates_keyboard()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start", "kursbot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/rate", "kursbot").unwrap(), Command::Rate);
        assert_eq!(Command::parse("/rate@kursbot", "kursbot").unwrap(), Command::Rate);
        assert!(Command::parse("/unknown", "kursbot").is_err());
        assert!(Command::parse("just a message", "kursbot").is_err());
    }

    #[test]
    fn test_callback_action_parsing() {
        assert_eq!(CallbackAction::parse("get_rates"), Some(CallbackAction::ShowRates));
        assert_eq!(CallbackAction::parse("refresh_rates"), Some(CallbackAction::ShowRates));
        assert_eq!(CallbackAction::parse("about"), Some(CallbackAction::About));
        assert_eq!(CallbackAction::parse("something_else"), None);
    }

    #[test]
    fn test_keyboard_buttons_map_to_known_actions() {
        let keyboard = rates_keyboard();
        let data: Vec<&str> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(data, vec!["refresh_rates", "get_rates", "about"]);
        for d in data {
            assert!(CallbackAction::parse(d).is_some(), "unroutable button: {d}");
        }
    }

    #[test]
    fn test_welcome_text_greets_by_name() {
        let text = welcome_text("Alice");
        assert!(text.starts_with("Hi, Alice!"));
        assert!(text.contains("/rate"));
    }

    #[test]
    fn test_about_text_mentions_commands() {
        assert!(ABOUT_TEXT.contains("/rate"));
        assert!(ABOUT_TEXT.contains("/start"));
    }
}
