//! Domain services behind the websocket gateway.
//!
//! ARCHITECTURE
//! ============
//! `history`, `stroke`, and `roster` are plain synchronous state owned by the
//! `canvas` actor. Route handlers never touch them directly; they go through
//! [`canvas::CanvasHandle`].

pub mod canvas;
pub mod history;
pub mod roster;
pub mod stroke;
