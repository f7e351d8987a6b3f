use std::sync::Arc;

use chat_widget_core::{
    init_tracing, AppConfig, AvatarSlot, ChatWidget, FallbackSource, FileBlobStore, FileFallback,
    HttpTransport, MessageContent, MessageRow, Sender, StaticFallback,
};
use tokio::io::{self, AsyncBufReadExt, BufReader};

const HELP: &str = "commands: /older  /clear  /avatar <png file>  /quit";

fn print_row(row: &MessageRow) {
    let who = match row.sender {
        Sender::User => "you",
        Sender::Bot => "bot",
    };
    match &row.content {
        MessageContent::PlainText { text } => println!("[{}] {who}: {text}", row.clock),
        MessageContent::StructuredList(list) => {
            println!("[{}] {who}:", row.clock);
            for item in &list.items {
                println!("    {:<28} {}", item.label, item.count);
            }
        }
    }
    if let Some(footer) = &row.footer {
        println!("    {footer}");
    }
}

fn print_frame(widget: &ChatWidget) {
    let frame = widget.frame();
    if frame.has_older {
        println!("  (older messages: /older)");
    }
    for row in &frame.rows {
        print_row(row);
    }
}

#[tokio::main]
async fn main() -> chat_widget_core::Result<()> {
    init_tracing("info");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_env_or_file(path)?,
        None => AppConfig::from_env(),
    };

    let transport = HttpTransport::from_config(&config.transport)?;
    let fallback: Arc<dyn FallbackSource> = match &config.fallback.path {
        Some(path) => Arc::new(FileFallback::new(path)),
        None => Arc::new(StaticFallback::bundled()),
    };
    let avatar = AvatarSlot::new(FileBlobStore::new(&config.storage.avatar_path));

    tracing::info!(url = transport.url(), "connecting to answering service");
    let widget = ChatWidget::new(config.widget.clone(), Arc::new(transport), fallback);

    println!("== {} ==", widget.title());
    if avatar.load().await?.is_some() {
        println!("(profile picture set)");
    }
    println!("{HELP}");
    widget.open();
    print_frame(&widget);

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        match line {
            "/quit" => break,
            "/older" => {
                if widget.scroll_to_top() {
                    print_frame(&widget);
                } else {
                    println!("  (start of conversation)");
                }
                continue;
            }
            "/clear" => {
                if widget.clear_conversation() {
                    print_frame(&widget);
                } else {
                    println!("  (nothing to clear)");
                }
                continue;
            }
            _ => {}
        }

        if let Some(path) = line.strip_prefix("/avatar ") {
            match tokio::fs::read(path.trim()).await {
                Ok(bytes) => {
                    avatar.save_image("image/png", &bytes).await?;
                    println!("  (profile picture updated)");
                }
                Err(err) => println!("  cannot read {path}: {err}"),
            }
            continue;
        }

        if widget.open() {
            println!("  (session timed out, starting a new one)");
        }
        if !widget.set_input(line) {
            println!(
                "  message is longer than {} characters",
                config.widget.max_message_length
            );
            continue;
        }
        match widget.submit_input().await {
            Ok(_) => {
                widget.take_scroll_request();
                print_frame(&widget);
            }
            Err(err) if err.is_input_rejection() => println!("  {err}"),
            Err(err) => return Err(err),
        }
    }

    widget.shutdown();
    Ok(())
}
