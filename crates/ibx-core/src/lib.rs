//! Core domain types for the ibx trade execution engine.
//!
//! This crate provides the fundamental types shared across the system:
//! - `Price`, `Qty`: precision-safe numeric types
//! - `Instrument`, `SecType`: tradeable instrument identifiers
//! - `Intent`: structured request from the external resolver
//! - `Action`, `ActionId`: validated, executable form of an intent
//! - `Order`, `OrderState`: gateway order lifecycle
//! - `AccountSnapshot` and the gateway event types that mutate it

pub mod account;
pub mod action;
pub mod decimal;
pub mod error;
pub mod events;
pub mod instrument;
pub mod intent;
pub mod order;

pub use account::{AccountSnapshot, Balances, Position};
pub use action::{Action, ActionDetail, ActionId, QueryAction, TradeAction};
pub use decimal::{Price, Qty};
pub use error::{CoreError, Result};
pub use events::{BalanceTag, GatewayEvent, OrderStatusEvent, OrderStatusKind, TickEvent};
pub use instrument::{Instrument, SecType};
pub use intent::{Intent, IntentKind, QueryKind};
pub use order::{Order, OrderMode, OrderSide, OrderState};
