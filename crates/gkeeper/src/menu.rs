//! Interactive terminal menu: one submenu per record kind, CRUD actions.

use anyhow::Result;
use std::io::{BufRead, Write};

use gk_core::{RecordId, RecordKind};

use crate::client::ClientCore;
use crate::records::RecordPlain;

enum Flow {
    Back,
    Exit,
}

pub async fn main_menu(client: &mut ClientCore) -> Result<()> {
    loop {
        println!();
        println!("GophKeeper");
        println!("1. List all records");
        println!("2. Passwords");
        println!("3. Texts");
        println!("4. Binary data");
        println!("5. Bank cards");
        println!("0. Exit");

        match prompt("Choose")?.as_str() {
            "1" => {
                if let Err(e) = list_all(client).await {
                    println!("Error: {e}");
                }
            }
            "2" => {
                if let Flow::Exit = kind_menu(client, RecordKind::Password).await? {
                    break;
                }
            }
            "3" => {
                if let Flow::Exit = kind_menu(client, RecordKind::Text).await? {
                    break;
                }
            }
            "4" => {
                if let Flow::Exit = kind_menu(client, RecordKind::Bin).await? {
                    break;
                }
            }
            "5" => {
                if let Flow::Exit = kind_menu(client, RecordKind::Bank).await? {
                    break;
                }
            }
            "0" => break,
            _ => println!("Unknown command. Try again."),
        }
    }
    println!("\nExiting...");
    Ok(())
}

async fn kind_menu(client: &mut ClientCore, kind: RecordKind) -> Result<Flow> {
    loop {
        println!();
        println!("{kind}");
        println!("1. List");
        println!("2. Create");
        println!("3. Read");
        println!("4. Update");
        println!("5. Delete");
        println!("9. Back");
        println!("0. Exit");

        let action = prompt("Choose")?;
        let result = match action.as_str() {
            "1" => list(client, kind).await,
            "2" => create(client, kind).await,
            "3" => read(client, kind).await,
            "4" => update(client, kind).await,
            "5" => delete(client, kind).await,
            "9" => return Ok(Flow::Back),
            "0" => return Ok(Flow::Exit),
            _ => {
                println!("Unknown command. Try again.");
                continue;
            }
        };
        if let Err(e) = result {
            println!("Error: {e}");
        }
    }
}

async fn list_all(client: &mut ClientCore) -> Result<()> {
    let entries = client.list_all().await?;
    if entries.is_empty() {
        println!("No records.");
        return Ok(());
    }
    for (kind, id, meta) in entries {
        println!("[{kind}] {id}: {meta}");
    }
    Ok(())
}

async fn list(client: &mut ClientCore, kind: RecordKind) -> Result<()> {
    let entries = client.list(kind).await?;
    if entries.is_empty() {
        println!("No records.");
        return Ok(());
    }
    for (id, meta) in entries {
        println!("{id}: {meta}");
    }
    Ok(())
}

async fn create(client: &mut ClientCore, kind: RecordKind) -> Result<()> {
    let plain = prompt_record(kind)?;
    client.create(&plain).await?;
    println!("Created.");
    Ok(())
}

async fn read(client: &mut ClientCore, kind: RecordKind) -> Result<()> {
    let id = prompt_id()?;
    let plain = client.read(kind, id).await?;
    print_record(&plain);
    Ok(())
}

async fn update(client: &mut ClientCore, kind: RecordKind) -> Result<()> {
    let id = prompt_id()?;
    let plain = prompt_record(kind)?;
    client.update(kind, id, &plain).await?;
    println!("Updated.");
    Ok(())
}

async fn delete(client: &mut ClientCore, kind: RecordKind) -> Result<()> {
    let id = prompt_id()?;
    client.delete(kind, id).await?;
    println!("Deleted.");
    Ok(())
}

fn prompt_record(kind: RecordKind) -> Result<RecordPlain> {
    let plain = match kind {
        RecordKind::Password => RecordPlain::Password {
            login: prompt("Login")?,
            password: rpassword::prompt_password("Password: ")?,
            meta: prompt("Meta")?,
        },
        RecordKind::Text => RecordPlain::Text {
            text: prompt("Text")?,
            meta: prompt("Meta")?,
        },
        RecordKind::Bin => RecordPlain::Bin {
            data: prompt("Data")?.into_bytes(),
            meta: prompt("Meta")?,
        },
        RecordKind::Bank => RecordPlain::Bank {
            number: prompt("Card number")?,
            holder: prompt("Holder name")?,
            date: prompt("Expiry date")?,
            cvv: rpassword::prompt_password("CVV: ")?,
            meta: prompt("Meta")?,
        },
        RecordKind::Unknown => anyhow::bail!("unknown record kind"),
    };
    Ok(plain)
}

fn print_record(plain: &RecordPlain) {
    match plain {
        RecordPlain::Password {
            login,
            password,
            meta,
        } => {
            println!("Login: {login}");
            println!("Password: {password}");
            println!("Meta: {meta}");
        }
        RecordPlain::Text { text, meta } => {
            println!("Text: {text}");
            println!("Meta: {meta}");
        }
        RecordPlain::Bin { data, meta } => {
            println!("Data: {}", String::from_utf8_lossy(data));
            println!("Meta: {meta}");
        }
        RecordPlain::Bank {
            number,
            holder,
            date,
            cvv,
            meta,
        } => {
            println!("Number: {number}");
            println!("Holder: {holder}");
            println!("Date: {date}");
            println!("CVV: {cvv}");
            println!("Meta: {meta}");
        }
    }
}

fn prompt_id() -> Result<RecordId> {
    let input = prompt("Record id")?;
    input
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid number: {input}"))
}

fn prompt(label: &str) -> std::io::Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
