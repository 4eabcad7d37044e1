//! Shared canvas model for the collaborative sketchboard.
//!
//! This crate is used by both the authority server and every replica. It owns
//! the committed-history data types, the wire protocol with its validation
//! gate, and the replica-side mirror that re-derives the visible canvas from
//! the authority's broadcasts. Pixel rendering and input capture live outside.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`doc`] | Operations, strokes, participants |
//! | [`wire`] | Client/server messages and inbound validation |
//! | [`replica`] | Local mirror of the authority's log |
//! | [`scene`] | Replay of active operations into paint order |

pub mod doc;
pub mod replica;
pub mod scene;
pub mod wire;
