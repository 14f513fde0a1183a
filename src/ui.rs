use ratatui::{prelude::*, widgets::*};

use crate::api::{Message, Role};
use crate::app::{App, InputMode};
use crate::markdown::render_markdown;
use crate::models::{ModelLoadState, NO_MODELS_NOTICE};

const EMPTY_STATE_HINT: &str = "Start a conversation with the AI assistant!";

fn label_style(role: Role) -> Style {
    let color = match role {
        Role::User => Color::Green,
        Role::Assistant => Color::Cyan,
        Role::System => Color::Magenta,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn body_style(role: Role) -> Style {
    match role {
        Role::User => Style::default(),
        Role::Assistant => Style::default().fg(Color::Cyan),
        Role::System => Style::default().fg(Color::Magenta),
    }
}

fn message_lines(message: &Message, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::styled(format!("{}: ", message.role.label()), label_style(message.role)));
    match message.role {
        Role::Assistant => lines.extend(render_markdown(&message.content, body_style(message.role))),
        role => lines.extend(
            message
                .content
                .lines()
                .map(|line| Line::styled(line.to_string(), body_style(role))),
        ),
    }
    lines.push(Line::from(""));
}

/// Transcript in order, followed by the typing placeholder (or the reply
/// streamed so far) while a turn is outstanding.
pub fn conversation_lines(app: &App) -> Vec<Line<'static>> {
    let session = &app.session;
    let mut lines = Vec::new();

    if session.conversation().is_empty() && !session.is_awaiting() {
        lines.push(Line::styled(EMPTY_STATE_HINT, Style::default().fg(Color::DarkGray)));
        return lines;
    }

    for message in session.conversation().messages() {
        message_lines(message, &mut lines);
    }

    if session.is_awaiting() {
        lines.push(Line::styled(
            format!("{}: ", Role::Assistant.label()),
            label_style(Role::Assistant),
        ));
        if session.partial_reply().is_empty() {
            lines.push(Line::styled("...", Style::default().fg(Color::DarkGray)));
        } else {
            lines.extend(render_markdown(session.partial_reply(), body_style(Role::Assistant)));
        }
    }
    lines
}

/// Rows `lines` take once wrapped to `width` columns. Counts characters, not
/// word boundaries, so it can come out slightly short for prose.
pub fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

// --- UI Drawing Logic ---
// Takes `&mut App` only to settle the scroll offset against the pane size.
pub fn ui(f: &mut Frame, app: &mut App) {
    // Main layout: Models List | Right Pane
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25), Constraint::Percentage(75)])
        .split(f.size());

    draw_models(f, app, main_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Conversation area
            Constraint::Length(3), // Input area height
            Constraint::Length(1), // Status bar height
        ])
        .split(main_chunks[1]);

    if app.models.is_ready() {
        draw_conversation(f, app, right_chunks[0]);
        draw_input(f, app, right_chunks[1]);
    } else {
        let hint = match app.models.state() {
            ModelLoadState::Loading => "Loading models...",
            _ => "Chat is unavailable until a model is loaded.",
        };
        let placeholder = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Conversation "));
        f.render_widget(placeholder, right_chunks[0]);
    }

    draw_status(f, app, right_chunks[2]);
}

fn draw_models(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Models (j/k) ");

    match app.models.state() {
        ModelLoadState::Loading => {
            f.render_widget(Paragraph::new("Loading models...").block(block), area);
        }
        ModelLoadState::Error => {
            let text = vec![
                Line::styled(NO_MODELS_NOTICE, Style::default().fg(Color::Red)),
                Line::from(""),
                Line::styled("[r] Retry", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            ];
            let error = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
            f.render_widget(error, area);
        }
        ModelLoadState::Ready => {
            let items: Vec<ListItem> = app
                .models
                .models()
                .iter()
                .map(|m| ListItem::new(m.as_str()))
                .collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::Blue))
                .highlight_symbol("> ");

            let mut list_state = ListState::default();
            list_state.select(app.models.selected_index());
            f.render_stateful_widget(list, area, &mut list_state);
        }
    }
}

fn draw_conversation(f: &mut Frame, app: &mut App, area: Rect) {
    let title = format!(
        " Chat with {} (PgUp/PgDn, c: clear{}) ",
        app.models.selected().unwrap_or_default(),
        if app.stream_replies { ", streaming" } else { "" }
    );
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);

    let lines = conversation_lines(app);
    let total = wrapped_height(&lines, inner.width);
    let offset = app.scroll.resolve(total.saturating_sub(inner.height));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    f.render_widget(paragraph, area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let (title, border) = match app.input_mode {
        _ if app.session.is_awaiting() => (" Input (waiting for reply...) ", Style::default().fg(Color::DarkGray)),
        InputMode::Editing => (" Input (Enter: Send, Esc: Stop typing) ", Style::default().fg(Color::Yellow)),
        InputMode::Normal => (" Input (Press Enter to type) ", Style::default()),
    };
    let block = Block::default().borders(Borders::ALL).title(title).border_style(border);

    let input = app.session.input();
    let inner_width = area.width.saturating_sub(2).max(1);
    // Keep the tail of long input visible on the single input row.
    let count = input.chars().count();
    let skip = count.saturating_sub(usize::from(inner_width.saturating_sub(1)));
    let visible: String = input.chars().skip(skip).collect();
    let visible_width = u16::try_from(count - skip).unwrap_or(u16::MAX);

    f.render_widget(Paragraph::new(visible).block(block), area);

    if app.input_mode == InputMode::Editing {
        let cursor_x = (area.x + 1).saturating_add(visible_width).min(area.right().saturating_sub(2));
        f.set_cursor(cursor_x, area.y + 1);
    }
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let status_style = if app.status_message.to_lowercase().contains("error") || app.models.state() == ModelLoadState::Error {
        Style::default().bg(Color::Red).fg(Color::White)
    } else if app.session.is_awaiting() {
        Style::default().bg(Color::Yellow).fg(Color::Black)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    };
    f.render_widget(Paragraph::new(app.status_message.as_str()).style(status_style), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppEvent;
    use ratatui::backend::TestBackend;

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn ready_app() -> App {
        let mut app = App::new();
        app.handle_event(AppEvent::ModelsLoaded(vec!["llama2".to_string()]));
        app
    }

    fn send(app: &mut App, text: &str) {
        for c in text.chars() {
            app.session.push_char(c);
        }
        app.session.submit("llama2").unwrap();
    }

    #[test]
    fn empty_transcript_shows_hint() {
        let app = ready_app();
        assert_eq!(text_of(&conversation_lines(&app)), vec![EMPTY_STATE_HINT]);
    }

    #[test]
    fn placeholder_only_while_awaiting() {
        let mut app = ready_app();
        send(&mut app, "hello");
        let lines = text_of(&conversation_lines(&app));
        assert_eq!(lines, vec!["You: ", "hello", "", "AI: ", "..."]);

        app.handle_event(AppEvent::ChatReply(Ok("hi there".to_string())));
        let lines = text_of(&conversation_lines(&app));
        assert_eq!(lines, vec!["You: ", "hello", "", "AI: ", "hi there", ""]);
    }

    #[test]
    fn streamed_text_replaces_placeholder() {
        let mut app = ready_app();
        send(&mut app, "hello");
        app.handle_event(AppEvent::ChatFragment("partial".to_string()));
        let lines = text_of(&conversation_lines(&app));
        assert_eq!(lines.last().map(String::as_str), Some("partial"));
        assert!(!lines.contains(&"...".to_string()));
    }

    #[test]
    fn wrapped_height_counts_wrapped_rows() {
        let lines = vec![Line::from("x".repeat(25)), Line::from(""), Line::from("short")];
        assert_eq!(wrapped_height(&lines, 10), 3 + 1 + 1);
        assert_eq!(wrapped_height(&lines, 0), 25 + 1 + 5);
    }

    #[test]
    fn long_transcript_is_scrolled_to_the_newest_message() {
        let mut app = ready_app();
        for turn in 0..20 {
            send(&mut app, &format!("question {turn}"));
            app.handle_event(AppEvent::ChatReply(Ok(format!("answer {turn}"))));
        }

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();

        assert!(app.scroll.is_following());
        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("answer 19"));
        assert!(!screen.contains("question 0 "));
    }

    #[test]
    fn very_long_input_shows_its_tail() {
        let mut app = ready_app();
        app.input_mode = InputMode::Editing;
        for _ in 0..70_000 {
            app.session.push_char('a');
        }
        for c in "END".chars() {
            app.session.push_char(c);
        }

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("aaaEND"));
    }

    #[test]
    fn error_state_renders_retry() {
        let mut app = App::new();
        app.handle_event(AppEvent::ModelsLoaded(Vec::new()));

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("[r] Retry"));
        assert!(screen.contains("Chat is unavailable"));
    }
}
