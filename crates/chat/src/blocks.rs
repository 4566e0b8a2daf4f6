use serde::Serialize;

use shoplist_core::domain::list::ShoppingList;
use shoplist_core::markers::{item_marker, ActionMarker};

const UNMARKED_ITEM: &str = "\u{2753}";
const CHECKED_BOX: &str = "\u{2705}";
const UNCHECKED_BOX: &str = "\u{2b1c}";
const CART: &str = "\u{1f6d2}";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Markdown { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Markdown { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Markdown { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, lines: Vec<TextObject> },
    Footer { block_id: String, text: TextObject },
}

/// Plain card model: what the platform adapter renders into its own
/// message format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Every text fragment in block order, for adapters without rich cards.
    pub fn render_plain(&self) -> String {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Header { text, .. } | Block::Footer { text, .. } => {
                    out.push(text.text().to_owned());
                }
                Block::Section { lines, .. } => {
                    out.extend(lines.iter().map(|line| line.text().to_owned()));
                }
            }
        }
        if out.is_empty() {
            self.fallback_text.clone()
        } else {
            out.join("\n")
        }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), lines: builder.build() });
        self
    }

    pub fn footer(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Footer { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    lines: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(TextObject::plain(text));
        self
    }

    pub fn markdown(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(TextObject::markdown(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.lines
    }
}

/// The card shown on a list's render target.
pub fn list_card(list: &ShoppingList) -> MessageTemplate {
    let title = format!("{CART} {}", list.title);
    let builder = MessageBuilder::new(title.clone()).header("shop.list.title.v1", title);

    if list.is_empty() {
        return builder
            .section("shop.list.items.v1", |section| {
                section.markdown("*Your shopping list is empty. Add some items with `/shop add`!*");
            })
            .footer("shop.list.footer.v1", "Use /shop add <item> to add items to your list")
            .build();
    }

    builder
        .section("shop.list.items.v1", |section| {
            for (position, item) in list.items.iter().enumerate() {
                let marker = item_marker(position)
                    .map(|marker| marker.symbol().to_owned())
                    .unwrap_or_else(|| UNMARKED_ITEM.to_owned());
                let (status, text) = if item.checked {
                    (CHECKED_BOX, format!("~~**{}**~~", item.text))
                } else {
                    (UNCHECKED_BOX, format!("**{}**", item.text))
                };
                section.markdown(format!("{marker}  {status}  {text}"));
            }
        })
        .footer("shop.list.footer.v1", list_instructions(list))
        .build()
}

fn list_instructions(list: &ShoppingList) -> String {
    let mut instructions = "Click number emojis to check/uncheck items".to_owned();
    if list.has_checked_items() {
        instructions.push_str(&format!(
            " \u{2022} {} Clear completed",
            ActionMarker::ClearCompleted.symbol()
        ));
    }
    instructions.push_str(&format!(
        " \u{2022} {} Add item \u{2022} {} Edit",
        ActionMarker::AddItem.symbol(),
        ActionMarker::Edit.symbol()
    ));
    instructions
}

pub fn help_card() -> MessageTemplate {
    MessageBuilder::new("Shopping list help")
        .header("shop.help.title.v1", format!("{CART} Shopping List Bot"))
        .section("shop.help.start.v1", |section| {
            section
                .markdown("*Getting started*")
                .markdown("1. Set a shopping channel: `/shop channel #your-channel`")
                .markdown("2. Create a list: `/shop create \"My List\" milk;bread;eggs`")
                .markdown("3. Use emoji reactions to interact with items");
        })
        .section("shop.help.reactions.v1", |section| {
            section
                .markdown("*How it works*")
                .markdown("1\u{fe0f}\u{20e3} 2\u{fe0f}\u{20e3} 3\u{fe0f}\u{20e3} **Click numbers**: check/uncheck items")
                .markdown(format!(
                    "{} **Clear completed**: remove all checked items at once",
                    ActionMarker::ClearCompleted.symbol()
                ))
                .markdown(format!("{} **Add item**: add new items quickly", ActionMarker::AddItem.symbol()))
                .markdown(format!("{} **Edit**: modify existing items", ActionMarker::Edit.symbol()));
        })
        .section("shop.help.commands.v1", |section| {
            section
                .markdown("*Commands*")
                .markdown("`/shop create <title> [items]` - Create new shopping list")
                .markdown("`/shop add <item> [quantity]` - Add item to list")
                .markdown("`/shop list` - Show current list")
                .markdown("`/shop clear` - Clear the list")
                .markdown("`/shop channel <channel>` - Set shopping channel")
                .markdown("`/shop delete` - Delete the list and its message");
        })
        .build()
}

/// One-line message, used for confirmations, prompts and announcements.
pub fn notice(text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone())
        .section("shop.notice.v1", |section| {
            section.markdown(text);
        })
        .build()
}

/// Numbered item overview sent when a user starts editing.
pub fn edit_prompt(list: &ShoppingList, actor_mention: &str) -> MessageTemplate {
    let fallback = format!("{actor_mention}, which item would you like to edit?");
    MessageBuilder::new(fallback.clone())
        .section("shop.edit.prompt.v1", |section| {
            section.markdown(format!("{} {fallback}", ActionMarker::Edit.symbol()));
            for (index, item) in list.items.iter().enumerate() {
                let (status, text) = if item.checked {
                    (CHECKED_BOX, format!("~~{}~~", item.text))
                } else {
                    (UNCHECKED_BOX, item.text.clone())
                };
                section.markdown(format!("**{}.** {status} {text}", index + 1));
            }
            section.markdown(format!(
                "Reply with a number (1-{}) to edit, or \"cancel\" to cancel.",
                list.items.len()
            ));
        })
        .build()
}

pub fn error_notice(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("shop.error.summary.v1", |section| {
            section.markdown(format!("\u{26a0}\u{fe0f} {summary}"));
        })
        .footer("shop.error.context.v1", format!("Correlation ID: {correlation_id}"))
        .build()
}

#[cfg(test)]
mod tests {
    use shoplist_core::domain::list::ShoppingList;

    use super::{edit_prompt, error_notice, help_card, list_card, notice, Block, MessageBuilder, TextObject};

    fn lines(card: &super::MessageTemplate) -> Vec<String> {
        card.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Section { lines, .. } => Some(lines),
                _ => None,
            })
            .flatten()
            .map(|line| line.text().to_owned())
            .collect()
    }

    fn footer(card: &super::MessageTemplate) -> Option<String> {
        card.blocks.iter().find_map(|block| match block {
            Block::Footer { text, .. } => Some(text.text().to_owned()),
            _ => None,
        })
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("shop.title.v1", "Title")
            .section("shop.body.v1", |section| {
                section.plain("one").markdown("*two*");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[1],
            Block::Section { block_id, lines }
                if block_id == "shop.body.v1" && matches!(lines[1], TextObject::Markdown { .. })
        ));
        assert_eq!(message.render_plain(), "Title\none\n*two*");
    }

    #[test]
    fn list_card_marks_checked_items_with_strike_through() {
        let mut list = ShoppingList::new("Weekly", ["milk", "bread"]);
        list.items[1].checked = true;

        let card = list_card(&list);
        let rendered = lines(&card);
        assert_eq!(rendered[0], "1\u{fe0f}\u{20e3}  \u{2b1c}  **milk**");
        assert_eq!(rendered[1], "2\u{fe0f}\u{20e3}  \u{2705}  ~~**bread**~~");
        assert!(footer(&card).is_some_and(|text| text.contains("Clear completed")));
        assert!(card.fallback_text.contains("Weekly"));
    }

    #[test]
    fn list_card_footer_omits_clear_when_nothing_checked() {
        let card = list_card(&ShoppingList::new("Weekly", ["milk"]));
        let footer = footer(&card).expect("footer");
        assert!(!footer.contains("Clear completed"));
        assert!(footer.contains("Add item") && footer.contains("Edit"));
    }

    #[test]
    fn empty_list_card_points_at_add_command() {
        let card = list_card(&ShoppingList::new("Weekly", Vec::<String>::new()));
        assert!(lines(&card)[0].contains("empty"));
        assert!(footer(&card).is_some_and(|text| text.contains("/shop add")));
    }

    #[test]
    fn items_past_the_catalog_get_a_placeholder_marker() {
        let list = ShoppingList::new("Big", (0..52).map(|index| format!("item {index}")));
        let rendered = lines(&list_card(&list));
        assert_eq!(rendered.len(), 52);
        assert!(rendered[50].starts_with('\u{2753}'));
        assert!(!rendered[49].starts_with('\u{2753}'));
    }

    #[test]
    fn edit_prompt_numbers_items_from_one() {
        let list = ShoppingList::new("Weekly", ["milk", "bread"]);
        let rendered = lines(&edit_prompt(&list, "<@U1>"));
        assert!(rendered[0].contains("<@U1>"));
        assert!(rendered[1].starts_with("**1.**") && rendered[2].starts_with("**2.**"));
        assert!(rendered[3].contains("(1-2)"));
    }

    #[test]
    fn help_card_lists_every_subcommand() {
        let text = help_card().render_plain();
        for subcommand in ["create", "add", "list", "clear", "channel", "delete"] {
            assert!(text.contains(&format!("/shop {subcommand}")), "missing {subcommand}");
        }
    }

    #[test]
    fn notices_and_errors_keep_their_text() {
        assert_eq!(notice("done").render_plain(), "done");
        let error = error_notice("Cannot process request", "req-123");
        assert!(error.render_plain().contains("req-123"));
    }
}
