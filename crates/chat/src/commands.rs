use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use shoplist_core::domain::{ChannelId, GuildId, UserId};
use shoplist_core::errors::{ApplicationError, DomainError};

use crate::blocks::{self, MessageTemplate};

pub const SHOP_COMMAND: &str = "/shop";

/// A slash command as delivered by the gateway, options already split out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: String,
    pub subcommand: String,
    pub options: BTreeMap<String, String>,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    pub request_id: String,
}

impl CommandInvocation {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShopCommand {
    Create { title: String, items: Vec<String> },
    Add { item: String, quantity: u32 },
    List,
    Clear,
    Channel { channel: ChannelId },
    Delete,
    Help,
    Unknown { subcommand: String },
}

/// What goes back to the invoking user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandReply {
    pub message: MessageTemplate,
    /// Only the invoking user sees it.
    pub ephemeral: bool,
}

impl CommandReply {
    pub fn ephemeral(message: MessageTemplate) -> Self {
        Self { message, ephemeral: true }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error("command service failed: {0}")]
    Service(#[from] ApplicationError),
}

pub fn parse_shop_command(invocation: &CommandInvocation) -> Result<ShopCommand, CommandParseError> {
    if invocation.command != SHOP_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(invocation.command.clone()));
    }

    let subcommand = invocation.subcommand.trim().to_ascii_lowercase();
    let command = match subcommand.as_str() {
        "create" => {
            let title = required_option(invocation, "title")?;
            let items = invocation.option("items").map(split_items).unwrap_or_default();
            ShopCommand::Create { title, items }
        }
        "add" => {
            let item =
                invocation.option("item").ok_or(DomainError::MissingOption("item"))?.trim();
            if item.is_empty() {
                return Err(DomainError::EmptyItem.into());
            }
            ShopCommand::Add { item: item.to_owned(), quantity: parse_quantity(invocation)? }
        }
        "list" => ShopCommand::List,
        "clear" => ShopCommand::Clear,
        "channel" => {
            let raw = required_option(invocation, "channel")?;
            ShopCommand::Channel { channel: parse_channel_reference(&raw)? }
        }
        "delete" => ShopCommand::Delete,
        "" | "help" => ShopCommand::Help,
        _ => ShopCommand::Unknown { subcommand },
    };
    Ok(command)
}

/// `;`-separated item texts, trimmed, empties dropped.
pub fn split_items(raw: &str) -> Vec<String> {
    raw.split(';').map(str::trim).filter(|item| !item.is_empty()).map(str::to_owned).collect()
}

fn required_option(
    invocation: &CommandInvocation,
    name: &'static str,
) -> Result<String, DomainError> {
    invocation
        .option(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or(DomainError::MissingOption(name))
}

fn parse_quantity(invocation: &CommandInvocation) -> Result<u32, DomainError> {
    let Some(raw) = invocation.option("quantity").map(str::trim).filter(|raw| !raw.is_empty())
    else {
        return Ok(1);
    };
    let parsed = raw
        .parse::<u32>()
        .map_err(|_| DomainError::InvalidOption { option: "quantity", value: raw.to_owned() })?;
    Ok(parsed.max(1))
}

/// Accepts a bare id or a `<#id>` mention.
fn parse_channel_reference(raw: &str) -> Result<ChannelId, DomainError> {
    let id = raw.strip_prefix("<#").and_then(|rest| rest.strip_suffix('>')).unwrap_or(raw).trim();
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(DomainError::InvalidOption { option: "channel", value: raw.to_owned() });
    }
    Ok(ChannelId::from(id))
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: ShopCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// User input and permission failures become an ephemeral reply; anything
    /// else is returned so the caller can answer with the generic failure.
    pub async fn route(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, CommandRouteError> {
        let command = match parse_shop_command(invocation) {
            Ok(command) => command,
            Err(CommandParseError::Invalid(error)) => {
                return Ok(CommandReply::ephemeral(blocks::notice(error.user_message())));
            }
            Err(error) => return Err(error.into()),
        };

        let outcome = match command {
            ShopCommand::Create { title, items } => {
                self.service.create_list(&title, &items, invocation).await
            }
            ShopCommand::Add { item, quantity } => {
                self.service.add_item(&item, quantity, invocation).await
            }
            ShopCommand::List => self.service.show_list(invocation).await,
            ShopCommand::Clear => self.service.clear_list(invocation).await,
            ShopCommand::Channel { channel } => self.service.set_channel(&channel, invocation).await,
            ShopCommand::Delete => self.service.delete_list(invocation).await,
            ShopCommand::Help => Ok(CommandReply::ephemeral(blocks::help_card())),
            ShopCommand::Unknown { subcommand } => Ok(CommandReply::ephemeral(blocks::notice(
                format!("Unsupported command `/shop {subcommand}`. Try `/shop help`."),
            ))),
        };

        match outcome {
            Ok(reply) => Ok(reply),
            Err(ApplicationError::Domain(error)) => {
                Ok(CommandReply::ephemeral(blocks::notice(error.user_message())))
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
pub trait ShopCommandService: Send + Sync {
    async fn create_list(
        &self,
        title: &str,
        items: &[String],
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError>;

    async fn add_item(
        &self,
        item: &str,
        quantity: u32,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError>;

    async fn show_list(&self, invocation: &CommandInvocation)
        -> Result<CommandReply, ApplicationError>;

    async fn clear_list(&self, invocation: &CommandInvocation)
        -> Result<CommandReply, ApplicationError>;

    async fn set_channel(
        &self,
        channel: &ChannelId,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError>;

    async fn delete_list(&self, invocation: &CommandInvocation)
        -> Result<CommandReply, ApplicationError>;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use shoplist_core::domain::{ChannelId, UserId};
    use shoplist_core::errors::{ApplicationError, DomainError};

    use super::{
        parse_shop_command, split_items, CommandInvocation, CommandParseError, CommandReply,
        CommandRouteError, CommandRouter, ShopCommand, ShopCommandService,
    };
    use crate::blocks;

    fn invocation(subcommand: &str, options: &[(&str, &str)]) -> CommandInvocation {
        CommandInvocation {
            command: "/shop".to_owned(),
            subcommand: subcommand.to_owned(),
            options: options
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect::<BTreeMap<_, _>>(),
            channel_id: ChannelId::from("C1"),
            guild_id: None,
            user_id: UserId::from("U1"),
            request_id: "req-1".to_owned(),
        }
    }

    struct EchoService;

    #[async_trait]
    impl ShopCommandService for EchoService {
        async fn create_list(
            &self,
            title: &str,
            items: &[String],
            _invocation: &CommandInvocation,
        ) -> Result<CommandReply, ApplicationError> {
            Ok(CommandReply::ephemeral(blocks::notice(format!("create {title} {}", items.len()))))
        }

        async fn add_item(
            &self,
            _item: &str,
            _quantity: u32,
            _invocation: &CommandInvocation,
        ) -> Result<CommandReply, ApplicationError> {
            Err(DomainError::ListNotFound(ChannelId::from("C1")).into())
        }

        async fn show_list(
            &self,
            _invocation: &CommandInvocation,
        ) -> Result<CommandReply, ApplicationError> {
            Err(ApplicationError::Integration("gateway down".to_owned()))
        }

        async fn clear_list(
            &self,
            _invocation: &CommandInvocation,
        ) -> Result<CommandReply, ApplicationError> {
            Ok(CommandReply::ephemeral(blocks::notice("cleared")))
        }

        async fn set_channel(
            &self,
            channel: &ChannelId,
            _invocation: &CommandInvocation,
        ) -> Result<CommandReply, ApplicationError> {
            Ok(CommandReply::ephemeral(blocks::notice(format!("channel {channel}"))))
        }

        async fn delete_list(
            &self,
            _invocation: &CommandInvocation,
        ) -> Result<CommandReply, ApplicationError> {
            Ok(CommandReply::ephemeral(blocks::notice("deleted")))
        }
    }

    #[test]
    fn create_splits_items_on_semicolons_and_drops_empties() {
        let command =
            parse_shop_command(&invocation("create", &[("title", " Weekly "), ("items", "milk; bread ;;")]))
                .expect("parse");
        assert_eq!(
            command,
            ShopCommand::Create {
                title: "Weekly".to_owned(),
                items: vec!["milk".to_owned(), "bread".to_owned()],
            }
        );
        assert!(split_items(" ; ").is_empty());
    }

    #[test]
    fn create_without_title_is_a_user_input_error() {
        let error = parse_shop_command(&invocation("create", &[])).expect_err("missing title");
        assert_eq!(error, CommandParseError::Invalid(DomainError::MissingOption("title")));
    }

    #[test]
    fn add_defaults_quantity_and_rejects_blank_items() {
        assert_eq!(
            parse_shop_command(&invocation("add", &[("item", "eggs")])).expect("parse"),
            ShopCommand::Add { item: "eggs".to_owned(), quantity: 1 }
        );
        assert_eq!(
            parse_shop_command(&invocation("add", &[("item", "eggs"), ("quantity", "3")]))
                .expect("parse"),
            ShopCommand::Add { item: "eggs".to_owned(), quantity: 3 }
        );
        assert_eq!(
            parse_shop_command(&invocation("add", &[("item", "   ")])).expect_err("blank"),
            CommandParseError::Invalid(DomainError::EmptyItem)
        );
        assert!(matches!(
            parse_shop_command(&invocation("add", &[("item", "eggs"), ("quantity", "-2")])),
            Err(CommandParseError::Invalid(DomainError::InvalidOption { option: "quantity", .. }))
        ));
    }

    #[test]
    fn channel_accepts_mentions_and_bare_ids() {
        assert_eq!(
            parse_shop_command(&invocation("channel", &[("channel", "<#C42>")])).expect("parse"),
            ShopCommand::Channel { channel: ChannelId::from("C42") }
        );
        assert_eq!(
            parse_shop_command(&invocation("channel", &[("channel", "C7")])).expect("parse"),
            ShopCommand::Channel { channel: ChannelId::from("C7") }
        );
    }

    #[test]
    fn other_slash_commands_are_rejected() {
        let mut foreign = invocation("help", &[]);
        foreign.command = "/todo".to_owned();
        assert_eq!(
            parse_shop_command(&foreign),
            Err(CommandParseError::UnsupportedCommand("/todo".to_owned()))
        );
    }

    #[tokio::test]
    async fn router_turns_domain_errors_into_ephemeral_replies() {
        let router = CommandRouter::new(EchoService);

        let reply = router.route(&invocation("add", &[("item", "eggs")])).await.expect("reply");
        assert!(reply.ephemeral);
        assert!(reply.message.fallback_text.contains("/shop create"));

        let reply = router.route(&invocation("create", &[])).await.expect("reply");
        assert!(reply.message.fallback_text.contains("title"));
    }

    #[tokio::test]
    async fn router_surfaces_integration_failures() {
        let router = CommandRouter::new(EchoService);
        let error = router.route(&invocation("list", &[])).await.expect_err("integration error");
        assert!(matches!(error, CommandRouteError::Service(ApplicationError::Integration(_))));
    }

    #[tokio::test]
    async fn router_answers_help_and_unknown_without_the_service() {
        let router = CommandRouter::new(EchoService);

        let help = router.route(&invocation("help", &[])).await.expect("help");
        assert!(help.ephemeral && help.message.render_plain().contains("/shop create"));

        let unknown = router.route(&invocation("frobnicate", &[])).await.expect("guidance");
        assert!(unknown.message.fallback_text.contains("/shop frobnicate"));
    }
}
