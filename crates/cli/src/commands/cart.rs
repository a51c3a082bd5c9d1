//! Cart commands.
//!
//! Each command applies its change to the local cart and prints the result.
//! Mutations are synced by the engine after the debounce window, or when the
//! process exits.

use std::io::Write;

use grocer_cart::{Cart, CartApi, CartView, CheckoutGate, CheckoutOutcome, NewLineItem};
use grocer_core::LineId;

use super::CliError;

pub fn show<A: CartApi>(cart: &Cart<A>, out: &mut impl Write) -> Result<(), CliError> {
    render(&cart.view(), out)?;
    Ok(())
}

pub fn add<A: CartApi>(
    cart: &Cart<A>,
    item: NewLineItem,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let line = LineId::new(item.product_id, item.variant_id);
    if cart.add_item(item) {
        writeln!(out, "Added {line}")?;
    } else {
        writeln!(out, "Nothing added: {line} is at its stock limit")?;
    }
    render(&cart.view(), out)?;
    Ok(())
}

pub fn update<A: CartApi>(
    cart: &Cart<A>,
    line: LineId,
    quantity: i64,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if cart.update_item(line, quantity) {
        writeln!(out, "Updated {line}")?;
    } else {
        writeln!(out, "No change to {line}")?;
    }
    render(&cart.view(), out)?;
    Ok(())
}

pub fn remove<A: CartApi>(
    cart: &Cart<A>,
    line: LineId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if cart.remove_item(line) {
        writeln!(out, "Removed {line}")?;
    } else {
        writeln!(out, "{line} is not in the cart")?;
    }
    render(&cart.view(), out)?;
    Ok(())
}

pub async fn clear<A: CartApi>(
    cart: &Cart<A>,
    remote: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if remote {
        cart.clear_remote().await?;
        writeln!(out, "Cart cleared here and on the server")?;
    } else {
        cart.clear_cart();
        writeln!(out, "Cart cleared on this device")?;
    }
    Ok(())
}

pub async fn sync<A: CartApi>(cart: &Cart<A>, out: &mut impl Write) -> Result<(), CliError> {
    let result = cart.flush().await;
    render(&cart.view(), out)?;
    result?;
    Ok(())
}

pub async fn checkout<A: CartApi>(
    cart: &Cart<A>,
    place_order: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let gate = CheckoutGate::new(cart.clone());
    match gate.proceed_to_checkout().await? {
        CheckoutOutcome::Navigate { synced } => {
            let note = if synced {
                "cart synced"
            } else {
                "cart will sync later"
            };
            writeln!(out, "Proceeding to checkout ({note})")?;
            if place_order {
                cart.order_placed();
                writeln!(out, "Order placed, cart emptied")?;
            }
        }
        CheckoutOutcome::AlreadyInProgress => {
            writeln!(out, "Checkout already in progress")?;
        }
    }
    Ok(())
}

/// Print a cart view as a table with a status footer.
pub fn render(view: &CartView, out: &mut impl Write) -> std::io::Result<()> {
    let owner = match view.auth {
        grocer_cart::AuthState::Guest => "guest".to_string(),
        grocer_cart::AuthState::Authenticated(user) => format!("user {user}"),
    };

    if view.items.is_empty() {
        writeln!(out, "Cart ({owner}) is empty")?;
    } else {
        writeln!(
            out,
            "Cart ({owner}, {} lines, {} items)",
            view.items.len(),
            view.item_count
        )?;
        for item in &view.items {
            writeln!(
                out,
                "  {:<8} {} {} {:<6} x{:<3} {}",
                item.line_id().to_string(),
                item.product_name,
                item.variant_amount,
                item.variant_unit,
                item.quantity,
                item.line_total()
            )?;
        }
        writeln!(out, "Total: {}", view.total)?;
    }

    write!(out, "Sync: {}", view.status)?;
    if view.pending_actions > 0 {
        write!(out, ", {} pending", view.pending_actions)?;
    }
    if view.retry_count > 0 {
        write!(out, ", retry {}", view.retry_count)?;
    }
    if let Some(at) = view.last_synced_at {
        write!(out, ", last synced {}", at.format("%Y-%m-%d %H:%M:%S"))?;
    }
    writeln!(out)?;

    if view.needs_reauth() {
        writeln!(out, "Session expired: sign in again with --user")?;
    } else if let Some(error) = &view.last_error {
        writeln!(out, "Last error: {error}")?;
    }
    Ok(())
}
