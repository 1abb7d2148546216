#![allow(clippy::collapsible_if)]

// Core modules
pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod models;
pub mod ui;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use tokio::sync::mpsc::unbounded_channel;

pub use config::{ManagerConfig, SimulationSettings};
pub use data::StompConnector;
pub use domain::{Card, CardSpec, TradingStyle};
pub use engine::{ConnectionManager, ManagerCommand, StoppedAnalysis};

use ui::{TerminalView, render_summary, render_trades};
use utils::format_duration;

// CLI argument parsing
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Card to analyse, as EXCHANGE:SYMBOL:QUOTE[:STYLE] (e.g. UPBIT:BTC:KRW:swing). Repeatable.
    #[arg(long = "card", value_parser = parse_card, required = true)]
    pub cards: Vec<CardSpec>,

    /// Backend base URL (http, https, ws or wss)
    #[arg(long)]
    pub server: Option<String>,

    /// Also listen on the shared analysis topic
    #[arg(long, default_value_t = false)]
    pub common_topic: bool,

    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,

    #[arg(long)]
    pub reconnect_backoff_ms: Option<u64>,

    /// Paper-trade every card on its analysis signals
    #[arg(long, default_value_t = false)]
    pub simulate: bool,

    /// Buy signal strength needed to open a position
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Take-profit, in percent
    #[arg(long)]
    pub take_profit: Option<f64>,

    /// Stop-loss, in percent
    #[arg(long)]
    pub stop_loss: Option<f64>,

    #[arg(long)]
    pub initial_balance: Option<f64>,

    /// Share of the balance put into each position (0..1)
    #[arg(long)]
    pub position_fraction: Option<f64>,

    /// Minimum seconds between two trades
    #[arg(long)]
    pub cooldown_secs: Option<u64>,
}

impl Cli {
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(attempts) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(ms) = self.reconnect_backoff_ms {
            config.reconnect_backoff = Duration::from_millis(ms);
        }
        config.subscribe_common_topic = self.common_topic;
        config
    }

    /// `None` unless `--simulate` was given.
    pub fn simulation_settings(&self) -> Option<SimulationSettings> {
        if !self.simulate {
            return None;
        }
        let mut settings = SimulationSettings::default();
        if let Some(threshold) = self.threshold {
            settings.signal_threshold = threshold;
        }
        if let Some(pct) = self.take_profit {
            settings.take_profit_pct = pct;
        }
        if let Some(pct) = self.stop_loss {
            settings.stop_loss_pct = pct;
        }
        if let Some(balance) = self.initial_balance {
            settings.initial_balance = balance;
        }
        if let Some(fraction) = self.position_fraction {
            settings.position_fraction = fraction.clamp(0.0, 1.0);
        }
        if let Some(secs) = self.cooldown_secs {
            settings.cooldown = Duration::from_secs(secs);
        }
        Some(settings)
    }
}

/// Parses `EXCHANGE:SYMBOL:QUOTE[:STYLE]`.
pub fn parse_card(arg: &str) -> Result<CardSpec, String> {
    let parts: Vec<&str> = arg.split(':').map(str::trim).collect();
    let (exchange, symbol, quote, style) = match parts.as_slice() {
        [exchange, symbol, quote] => (*exchange, *symbol, *quote, TradingStyle::default()),
        [exchange, symbol, quote, style] => {
            let style = style
                .parse::<TradingStyle>()
                .map_err(|_| format!("unknown trading style '{style}' (scalping, dayTrading, swing)"))?;
            (*exchange, *symbol, *quote, style)
        }
        _ => return Err(format!("expected EXCHANGE:SYMBOL:QUOTE[:STYLE], got '{arg}'")),
    };
    if exchange.is_empty() || symbol.is_empty() || quote.is_empty() {
        return Err(format!("empty field in '{arg}'"));
    }
    Ok(CardSpec::new(exchange, symbol, quote, style))
}

/// Runs the terminal client until Ctrl-C, then prints a summary of every
/// simulated card.
pub async fn run_desk(args: Cli) -> Result<()> {
    if args.cards.is_empty() {
        bail!("no cards given");
    }
    let config = args.manager_config();
    log::info!("Analysis server: {}", config.endpoint_url());

    let connector = Arc::new(StompConnector::new(&config));
    let manager = ConnectionManager::new(config, connector, TerminalView::new());

    let (commands, commands_rx) = unbounded_channel();
    let simulation = args.simulation_settings();
    for spec in args.cards {
        let _ = commands.send(ManagerCommand::Open {
            spec,
            simulation: simulation.clone(),
        });
    }

    let shutdown = commands.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Ctrl-C received, closing all connections"),
            Err(e) => log::error!("Ctrl-C handler failed: {}", e),
        }
        let _ = shutdown.send(ManagerCommand::Shutdown);
    });

    let finished = manager.run(commands_rx).await;
    for stopped in &finished {
        if let Some(trader) = &stopped.simulation {
            let ran_ms = (Utc::now() - stopped.card.created_at).num_milliseconds();
            println!(
                "\n{} [{}] ran {}, ended {}, {} signal(s) skipped in cooldown",
                stopped.card.spec,
                stopped.card.current_id(),
                format_duration(ran_ms),
                stopped.status,
                trader.skipped_signals()
            );
            if !trader.trades().is_empty() {
                println!("{}", render_trades(trader.trades()));
            }
            println!("{}", render_summary(&trader.stats()));
        }
    }
    Ok(())
}
