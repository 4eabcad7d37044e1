//! Roster — connected participants and their presence colors.
//!
//! DESIGN
//! ======
//! Colors come from a fixed palette. A joining participant takes the first
//! unused slot; once every slot is taken, colors repeat by roster size. A
//! slot is released when its holder leaves. Roster order is join order.

use canvas::doc::{Participant, ParticipantId};

pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2", "#F8B739", "#52B788",
];

pub struct Roster {
    participants: Vec<(Option<usize>, Participant)>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self { participants: Vec::new() }
    }

    /// Register a participant and return its roster entry. Joining twice
    /// returns the existing entry.
    pub fn join(&mut self, id: ParticipantId) -> Participant {
        if let Some((_, existing)) = self.participants.iter().find(|(_, p)| p.id == id) {
            return existing.clone();
        }

        let slot = (0..PALETTE.len()).find(|slot| !self.participants.iter().any(|(s, _)| *s == Some(*slot)));
        let color = PALETTE[slot.unwrap_or(self.participants.len() % PALETTE.len())];
        let participant = Participant {
            id,
            name: format!("User {}", self.participants.len() + 1),
            color: color.to_string(),
            is_active: true,
        };
        self.participants.push((slot, participant.clone()));
        participant
    }

    /// Remove a participant, releasing its palette slot.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        let pos = self.participants.iter().position(|(_, p)| p.id == id)?;
        Some(self.participants.remove(pos).1)
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants
            .iter()
            .map(|(_, p)| p)
            .find(|p| p.id == id)
    }

    /// Participants in join order.
    #[must_use]
    pub fn list(&self) -> Vec<Participant> {
        self.participants.iter().map(|(_, p)| p.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}
