use pulldown_cmark::{Event as MDEvent, Options, Parser, Tag as MDTag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

fn code_block_style() -> Style {
    Style::default().bg(Color::Rgb(40, 40, 40)).fg(Color::White)
}

fn inline_code_style() -> Style {
    Style::default()
        .bg(Color::Rgb(50, 50, 50))
        .fg(Color::Yellow)
        .add_modifier(Modifier::ITALIC)
}

fn fence() -> Line<'static> {
    Line::styled("```", Style::default().fg(Color::DarkGray))
}

/// Renders a message body into terminal lines, with `base` as the plain
/// text style.
pub fn render_markdown(input: &str, base: Style) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(input, options);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut style = base;
    // Next number to print for each open list; `None` for bullet lists.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut in_code_block = false;
    let mut in_image = false;

    let flush = |lines: &mut Vec<Line<'static>>, spans: &mut Vec<Span<'static>>| {
        if !spans.is_empty() {
            lines.push(Line::from(std::mem::take(spans)));
        }
    };

    for event in parser {
        if in_image {
            // Alt text is replaced by the placeholder.
            if let MDEvent::End(MDTag::Image(..)) = event {
                in_image = false;
            }
            continue;
        }

        match event {
            MDEvent::Start(tag) => match tag {
                MDTag::Paragraph => style = base,
                MDTag::Heading(level, _, _) => {
                    flush(&mut lines, &mut spans);
                    style = Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD);
                    spans.push(Span::styled("#".repeat(level as usize) + " ", style));
                }
                MDTag::BlockQuote => {
                    flush(&mut lines, &mut spans);
                    style = Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC);
                    spans.push(Span::styled("> ", style));
                }
                MDTag::CodeBlock(_) => {
                    flush(&mut lines, &mut spans);
                    in_code_block = true;
                    style = code_block_style();
                    lines.push(fence());
                }
                MDTag::List(start) => {
                    flush(&mut lines, &mut spans);
                    lists.push(start);
                }
                MDTag::Item => {
                    flush(&mut lines, &mut spans);
                    let indent = "  ".repeat(lists.len().saturating_sub(1));
                    let marker = match lists.last_mut() {
                        Some(Some(next)) => {
                            let marker = format!("{}. ", next);
                            *next += 1;
                            marker
                        }
                        _ => "* ".to_string(),
                    };
                    style = base;
                    spans.push(Span::raw(indent));
                    spans.push(Span::styled(marker, Style::default().fg(Color::Green)));
                }
                MDTag::Emphasis => style = style.add_modifier(Modifier::ITALIC),
                MDTag::Strong => style = style.add_modifier(Modifier::BOLD),
                MDTag::Strikethrough => style = style.add_modifier(Modifier::CROSSED_OUT),
                MDTag::Link(..) => style = style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                MDTag::Image(..) => {
                    spans.push(Span::styled("[Image]", Style::default().fg(Color::DarkGray)));
                    in_image = true;
                }
                MDTag::Table(_) | MDTag::TableHead | MDTag::TableRow | MDTag::TableCell => {}
                MDTag::FootnoteDefinition(_) => {}
            },
            MDEvent::End(tag) => match tag {
                MDTag::Paragraph | MDTag::Heading(..) | MDTag::Item => {
                    flush(&mut lines, &mut spans);
                }
                MDTag::BlockQuote => {
                    flush(&mut lines, &mut spans);
                    style = base;
                }
                MDTag::CodeBlock(_) => {
                    flush(&mut lines, &mut spans);
                    in_code_block = false;
                    lines.push(fence());
                    style = base;
                }
                MDTag::List(_) => {
                    lists.pop();
                }
                MDTag::Emphasis => style = style.remove_modifier(Modifier::ITALIC),
                MDTag::Strong => style = style.remove_modifier(Modifier::BOLD),
                MDTag::Strikethrough => style = style.remove_modifier(Modifier::CROSSED_OUT),
                MDTag::Link(..) => {
                    style = style.remove_modifier(Modifier::UNDERLINED);
                    style.fg = base.fg;
                }
                MDTag::Image(..) => {}
                MDTag::Table(_) | MDTag::TableHead | MDTag::TableRow | MDTag::TableCell => {}
                MDTag::FootnoteDefinition(_) => {}
            },
            MDEvent::Text(text) if in_code_block => {
                for code_line in text.lines() {
                    lines.push(Line::from(Span::styled(code_line.to_string(), style)));
                }
            }
            MDEvent::Text(text) => {
                for (i, segment) in text.lines().enumerate() {
                    if i > 0 {
                        flush(&mut lines, &mut spans);
                    }
                    spans.push(Span::styled(segment.to_string(), style));
                }
            }
            MDEvent::Code(text) => spans.push(Span::styled(text.to_string(), inline_code_style())),
            MDEvent::Html(_) | MDEvent::FootnoteReference(_) => {}
            MDEvent::SoftBreak => spans.push(Span::styled(" ", style)),
            MDEvent::HardBreak => flush(&mut lines, &mut spans),
            MDEvent::Rule => {
                flush(&mut lines, &mut spans);
                lines.push(Line::styled("─".repeat(40), Style::default().fg(Color::DarkGray)));
            }
            MDEvent::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                spans.push(Span::styled(marker, Style::default().fg(Color::Yellow)));
            }
        }
    }

    flush(&mut lines, &mut spans);
    if lines.is_empty() {
        lines.push(Line::raw(""));
    }
    lines
}
