//! Render orchestration for the chat TUI

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use kotoba_core::model::{Character, Message, MessageContent, Sender};

use crate::app::{App, CreatorField, InputMode, Screen};
use crate::ui::{centered_rect_fixed, Overlay};

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    match app.screen {
        Screen::Roster => render_roster(frame, app, area),
        Screen::Chat => render_chat(frame, app, area),
        Screen::Creator => render_creator(frame, app, area),
    }

    if let Some(overlay) = app.overlay() {
        render_overlay(frame, app, overlay, area);
    }
}

fn split_screen(area: Rect) -> (Rect, Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2], chunks[3])
}

/// Render the roster screen
fn render_roster(frame: &mut Frame, app: &App, area: Rect) {
    let (title_area, body, input_area, status_area) = split_screen(area);

    render_title(frame, " kotoba | 会話の相手 ", title_area);

    let characters = app.registry.list_by_recency();
    let items: Vec<ListItem> = characters
        .iter()
        .map(|c| roster_entry(c, &app.theme))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Friends ")
                .borders(Borders::ALL)
                .border_style(app.theme.border_style(true)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut state = ListState::default();
    if !characters.is_empty() {
        state.select(Some(app.roster_selected.min(characters.len() - 1)));
    }
    frame.render_stateful_widget(list, body, &mut state);

    render_input(frame, app, input_area);
    render_status(
        frame,
        app,
        "Enter: chat | n: new | e: edit | d: delete | ?: help | q: quit",
        status_area,
    );
}

fn roster_entry<'a>(character: &'a Character, theme: &crate::ui::theme::AppTheme) -> ListItem<'a> {
    let preview = character
        .chat_history
        .last()
        .map(|m| {
            let text = m.plain_text();
            let short: String = text.chars().take(40).collect();
            if text.chars().count() > 40 {
                format!("{short}…")
            } else {
                short
            }
        })
        .unwrap_or_else(|| "まだ会話がありません".to_string());

    ListItem::new(vec![
        Line::from(Span::styled(
            character.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(format!("  {preview}"), theme.system_style())),
    ])
}

/// Render the chat screen
fn render_chat(frame: &mut Frame, app: &App, area: Rect) {
    let (title_area, body, input_area, status_area) = split_screen(area);

    let name = app
        .conversation
        .as_ref()
        .and_then(|c| app.registry.get(c.character_id()))
        .map(|c| c.name.clone())
        .unwrap_or_default();
    render_title(frame, format!(" {name} "), title_area);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(conversation) = &app.conversation {
        for message in conversation.displayed() {
            lines.extend(message_lines(message, &name, app));
            lines.push(Line::from(""));
        }
    }

    let total_lines = lines.len();
    let visible = body.height.saturating_sub(2) as usize;
    let max_scroll = total_lines.saturating_sub(visible);
    let scroll = if app.scroll_locked_to_bottom {
        max_scroll
    } else {
        app.chat_scroll.min(max_scroll)
    };

    let pending_count = app
        .conversation
        .as_ref()
        .map(|c| c.pending().len())
        .unwrap_or(0);
    let chat_title = if pending_count > 0 {
        format!(" Chat ({pending_count} unsent) ")
    } else {
        " Chat ".to_string()
    };

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(chat_title)
                .borders(Borders::ALL)
                .border_style(app.theme.border_style(true)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));
    frame.render_widget(paragraph, body);

    render_input(frame, app, input_area);
    render_status(
        frame,
        app,
        "i: write | Enter: send turn | c: correction | v: vocab | Esc: roster",
        status_area,
    );
}

/// Lines for one chat message, with glossed words underlined and images as
/// placeholders.
fn message_lines<'a>(message: &'a Message, ai_name: &str, app: &App) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let (label, base_style) = match message.sender {
        Sender::User => ("You".to_string(), theme.user_style()),
        Sender::Ai => (ai_name.to_string(), theme.ai_style()),
    };

    let mut spans: Vec<Span> = vec![Span::styled(
        format!("{label}: "),
        base_style.add_modifier(Modifier::BOLD),
    )];

    for part in &message.parts {
        match part {
            MessageContent::Text(words) => {
                for word in words {
                    let style = if word.is_annotated() && message.sender == Sender::Ai {
                        theme.gloss_style()
                    } else {
                        base_style
                    };
                    spans.push(Span::styled(word.word.clone(), style));
                }
            }
            MessageContent::Image(_) => {
                spans.push(Span::styled("[image]", theme.system_style()));
            }
        }
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(correction) = &message.correction {
        if correction.is_correct {
            lines.push(Line::from(Span::styled(
                "  ✓ いいですね！",
                theme.correction_style(true),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                format!("  ✗ {}", correction.corrected_text),
                theme.correction_style(false),
            )));
        }
    }
    lines
}

/// Render the creator screen
fn render_creator(frame: &mut Frame, app: &App, area: Rect) {
    let (title_area, body, input_area, status_area) = split_screen(area);

    let editing = app.creator.as_ref().is_some_and(|f| f.draft.is_edit());
    render_title(
        frame,
        if editing {
            " Edit character "
        } else {
            " New character "
        },
        title_area,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(body);

    if let Some(form) = &app.creator {
        render_field(frame, app, " Name ", CreatorField::Name, chunks[0]);
        render_field(frame, app, " Idea (for generation) ", CreatorField::Idea, chunks[1]);
        render_field(frame, app, " Description ", CreatorField::Description, chunks[2]);

        let avatar_note = if form.draft.avatar.is_empty() {
            Span::styled("Avatar: none (press A to generate)", app.theme.system_style())
        } else {
            Span::styled(
                "Avatar: ready",
                app.theme.correction_style(true),
            )
        };
        frame.render_widget(Paragraph::new(Line::from(avatar_note)), chunks[3]);
    }

    render_input(frame, app, input_area);
    render_status(
        frame,
        app,
        "Tab: next field | i: edit field | G: description | A: avatar | s: save | Esc: back",
        status_area,
    );
}

fn render_field(frame: &mut Frame, app: &App, title: &str, field: CreatorField, area: Rect) {
    let Some(form) = &app.creator else { return };
    let focused = form.focus == field;

    // While editing the focused field, show the live buffer
    let value = if focused && app.input_mode == InputMode::Insert {
        app.input_buffer().to_string()
    } else {
        form.field(field).to_string()
    };

    let paragraph = Paragraph::new(value)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(app.theme.border_style(focused)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Render the title bar
fn render_title(frame: &mut Frame, title: impl Into<String>, area: Rect) {
    let line = Line::from(Span::styled(
        title.into(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the input bar
fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let (title, active) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", false),
        InputMode::Insert => (" INSERT ", true),
        InputMode::Command => (" COMMAND ", true),
    };

    let content = if app.input_buffer().is_empty() && !active {
        Span::styled(
            if app.busy {
                "相手の返事を待っています..."
            } else {
                "Press 'i' to type, ':' for commands"
            },
            app.theme.system_style(),
        )
    } else {
        Span::raw(app.input_buffer().to_string())
    };

    let paragraph = Paragraph::new(Line::from(content)).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(app.theme.border_style(active)),
    );
    frame.render_widget(paragraph, area);

    if active {
        // Cursor position in display columns (count chars as width 1; CJK
        // widths are handled approximately)
        let x = area.x + 1 + app.cursor_position() as u16;
        let y = area.y + 1;
        if x < area.x + area.width - 1 {
            frame.set_cursor_position((x, y));
        }
    }
}

/// Render the status bar
fn render_status(frame: &mut Frame, app: &App, hints: &str, area: Rect) {
    let line = match app.status_message() {
        Some(message) => Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(Span::styled(hints.to_string(), app.theme.system_style())),
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Render overlay
fn render_overlay(frame: &mut Frame, app: &App, overlay: &Overlay, area: Rect) {
    match overlay {
        Overlay::Help => render_help_overlay(frame, app, area),
        Overlay::Correction(index) => render_correction_overlay(frame, app, *index, area),
        Overlay::Vocab(index) => render_vocab_overlay(frame, app, *index, area),
        Overlay::ConfirmDelete { name, .. } => render_confirm_delete(frame, app, name, area),
        Overlay::ApiKey => render_api_key_overlay(frame, app, area),
        Overlay::Error(message) => render_error_overlay(frame, app, message, area),
    }
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(52, 22, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            " kotoba - Help ",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Input Modes:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  i       Enter INSERT mode (type a message)"),
        Line::from("  :       Enter COMMAND mode"),
        Line::from("  Esc     Return to NORMAL mode"),
        Line::from(""),
        Line::from(Span::styled(
            "Chat:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  Enter   Send the accumulated turn"),
        Line::from("  c       Show the latest correction"),
        Line::from("  v       Show vocabulary glosses"),
        Line::from("  j/k     Scroll, G to jump to bottom"),
        Line::from(""),
        Line::from(Span::styled(
            "Commands:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  :q               Quit"),
        Line::from("  :key <key>       Store the API key"),
        Line::from("  :image <path>    Attach an image to the turn"),
        Line::from("  :export <path>   Export all data"),
        Line::from("  :import <path>   Import data (replaces everything)"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or q to close",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    frame.render_widget(
        Paragraph::new(help_text).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

/// Render the correction detail overlay
fn render_correction_overlay(frame: &mut Frame, app: &App, index: usize, area: Rect) {
    let Some(message) = app
        .conversation
        .as_ref()
        .and_then(|c| c.displayed().get(index))
    else {
        return;
    };
    let Some(correction) = &message.correction else {
        return;
    };

    let popup_area = centered_rect_fixed(56, 12, area);
    frame.render_widget(Clear, popup_area);

    let mut lines = vec![
        Line::from(Span::styled(
            "あなたの文:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from(format!("  {}", message.plain_text())),
        Line::from(""),
    ];
    if correction.is_correct {
        lines.push(Line::from(Span::styled(
            "✓ この文は正しいです！",
            app.theme.correction_style(true),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "直した文:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {}", correction.corrected_text),
            app.theme.correction_style(false),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(correction.feedback.clone()));

    let block = Block::default()
        .title(" 添削 ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

/// Render the vocabulary overlay for one AI message
fn render_vocab_overlay(frame: &mut Frame, app: &App, index: usize, area: Rect) {
    let Some(message) = app
        .conversation
        .as_ref()
        .and_then(|c| c.displayed().get(index))
    else {
        return;
    };

    let popup_area = centered_rect_fixed(56, 14, area);
    frame.render_widget(Clear, popup_area);

    let mut lines: Vec<Line> = Vec::new();
    for part in &message.parts {
        if let MessageContent::Text(words) = part {
            for word in words {
                if let (Some(reading), Some(meaning)) = (&word.reading, &word.meaning) {
                    lines.push(Line::from(vec![
                        Span::styled(word.word.clone(), app.theme.gloss_style()),
                        Span::raw(format!(" （{reading}） ")),
                        Span::raw(meaning.clone()),
                    ]));
                }
            }
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No glossed words in this message.",
            app.theme.system_style(),
        )));
    }

    let block = Block::default()
        .title(" 単語 ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

/// Render the delete confirmation overlay
fn render_confirm_delete(frame: &mut Frame, app: &App, name: &str, area: Rect) {
    let popup_area = centered_rect_fixed(50, 7, area);
    frame.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from(format!("Delete {name} and the whole conversation?")),
        Line::from(""),
        Line::from(Span::styled(
            "y: delete | n/Esc: cancel",
            app.theme.system_style(),
        )),
    ];

    let block = Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightRed));
    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

/// Render the API key entry overlay
fn render_api_key_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(56, 9, area);
    frame.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from("A Gemini API key is needed before anyone can reply."),
        Line::from(""),
        Line::from(vec![
            Span::raw("> "),
            Span::styled(
                app.input_buffer().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Enter: save | Esc: skip (set later with :key)",
            app.theme.system_style(),
        )),
    ];

    let block = Block::default()
        .title(" API Key ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

/// Render the error overlay
fn render_error_overlay(frame: &mut Frame, app: &App, message: &str, area: Rect) {
    let popup_area = centered_rect_fixed(56, 8, area);
    frame.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to dismiss",
            app.theme.system_style(),
        )),
    ];

    let block = Block::default()
        .title(" Error ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightRed));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}
