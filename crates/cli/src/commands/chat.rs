//! `parley chat` — Interactive or single-message chat as a configured user.

use parley_agent::{ChatReply, build_chat_service};
use parley_core::{Message, Role};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    user_id: &str,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    super::require_api_key(&config, config_path)?;
    let user = super::resolve_user(&config, user_id)?;
    let service = build_chat_service(&config).await?;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = service.send_message(Some(&user), &msg).await;
        eprint!("\r              \r");
        print_reply(&reply?);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Parley — Interactive Chat");
    println!();
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", service.tools().ids().join(", "));
    println!("  User:      {} (@{})", user.display_name, user.handle);
    println!();
    println!("  Type your message and press Enter.");
    println!("  /history shows recent messages, /clear empties them.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "exit" | "quit" => break,
            "/clear" => match service.clear_history(Some(&user)).await {
                Ok(()) => println!("  Chat history cleared.\n"),
                Err(e) => eprintln!("  [Error] {e}\n"),
            },
            "/history" => match service.history(Some(&user)).await {
                Ok(messages) => print_history(&messages),
                Err(e) => eprintln!("  [Error] {e}\n"),
            },
            text => {
                eprint!("  ...");
                let reply = service.send_message(Some(&user), text).await;
                eprint!("\r     \r");
                match reply {
                    Ok(reply) => {
                        println!();
                        print_reply(&reply);
                        println!();
                    }
                    Err(e) => eprintln!("  [Error] {e}\n"),
                }
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_reply(reply: &ChatReply) {
    for call in &reply.tool_calls {
        eprintln!("  [tool] {}", call.tool);
    }
    for line in reply.content.lines() {
        println!("  Assistant > {line}");
    }
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("  (no history)\n");
        return;
    }
    for message in messages {
        match (message.role(), message.content()) {
            (Role::User, Some(text)) => println!("  You       > {text}"),
            (Role::Assistant, Some(text)) => println!("  Assistant > {text}"),
            (Role::Assistant, None) => {
                let names: Vec<&str> = message.tool_calls().iter().map(|c| c.name.as_str()).collect();
                println!("  Assistant > [calls {}]", names.join(", "));
            }
            _ => {}
        }
    }
    println!();
}
