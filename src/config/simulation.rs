/// Paper-trading defaults. All of these can be overridden per card.
pub struct SimulationDefaults {
    pub initial_balance: f64,
    /// Fraction of the current balance committed when a position opens
    pub position_fraction: f64,
    pub cooldown_ms: u64,
    /// Buy signal strength (0-100) needed to open a position
    pub signal_threshold: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
}

pub const SIMULATION: SimulationDefaults = SimulationDefaults {
    initial_balance: 1_000_000.0,
    position_fraction: 0.30,
    cooldown_ms: 5_000,
    signal_threshold: 50.0,
    take_profit_pct: 2.0,
    stop_loss_pct: 1.0,
};
