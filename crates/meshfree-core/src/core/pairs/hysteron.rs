use super::list::PairsError;

/// The outcome of one [`Hysteron::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transition {
    #[default]
    None,
    Engaged,
    Disengaged,
}

impl Transition {
    /// `+1` on engage, `-1` on disengage, `0` otherwise.
    pub fn event(self) -> i8 {
        match self {
            Transition::None => 0,
            Transition::Engaged => 1,
            Transition::Disengaged => -1,
        }
    }
}

/// Two-threshold contact switch.
///
/// A disengaged hysteron engages once the penetration exceeds `beta`; an engaged
/// one disengages once it drops below `alpha`. Between the two thresholds the
/// state is kept, which suppresses chatter around a single cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteron {
    alpha: f64,
    beta: f64,
    engaged: bool,
    last: Transition,
}

impl Hysteron {
    pub fn new(alpha: f64, beta: f64) -> Result<Self, PairsError> {
        if !(alpha.is_finite() && beta.is_finite() && alpha < beta) {
            return Err(PairsError::InvalidThresholds { alpha, beta });
        }
        Ok(Self {
            alpha,
            beta,
            engaged: false,
            last: Transition::None,
        })
    }

    /// Same thresholds, with an explicit initial state and no pending event.
    pub fn with_state(mut self, engaged: bool) -> Self {
        self.engaged = engaged;
        self.last = Transition::None;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// The transition recorded by the most recent update.
    pub fn last_transition(&self) -> Transition {
        self.last
    }

    pub fn event(&self) -> i8 {
        self.last.event()
    }

    pub fn update(&mut self, penetration: f64) -> Transition {
        self.last = if !self.engaged && penetration > self.beta {
            self.engaged = true;
            Transition::Engaged
        } else if self.engaged && penetration < self.alpha {
            self.engaged = false;
            Transition::Disengaged
        } else {
            Transition::None
        };
        self.last
    }
}
