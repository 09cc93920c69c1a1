//! Output formatting for ledger results

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use pocketbank_ledger::{AccountSummary, TransferReceipt};
use pocketbank_types::{Amount, Username};
use serde_json::json;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn registered(account: &Username, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({ "username": account, "balance": Amount::ZERO.to_string() }));
    }
    success(&format!("Registration successful: {}", account));
    Ok(())
}

pub fn balance(username: &str, balance: Amount, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({ "username": username, "balance": balance.to_string() }));
    }
    println!("{}: {}", username, balance.to_grouped());
    Ok(())
}

pub fn applied(message: &str, username: &str, balance: Amount, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({ "username": username, "balance": balance.to_string() }));
    }
    success(message);
    println!("Balance: {}", balance.to_grouped());
    Ok(())
}

pub fn receipt(receipt: &TransferReceipt, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "sender": receipt.sender,
            "recipient": receipt.recipient,
            "amount": receipt.amount.to_string(),
            "sender_balance": receipt.sender_balance.to_string(),
            "recipient_balance": receipt.recipient_balance.to_string(),
        }));
    }
    success(&format!(
        "Sent {} to {}",
        receipt.amount.to_grouped(),
        receipt.recipient
    ));
    println!("Balance: {}", receipt.sender_balance.to_grouped());
    Ok(())
}

pub fn ranking(rows: &[AccountSummary], json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "rank": row.rank,
                    "username": row.username,
                    "balance": row.balance.to_string(),
                })
            })
            .collect();
        return print_json(&serde_json::Value::Array(rows));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Account", "Balance"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.rank),
            Cell::new(&row.username),
            Cell::new(row.balance.to_grouped()).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    Ok(())
}
