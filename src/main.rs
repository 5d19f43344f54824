//! Self-play driver: pits AI strategies against each other.

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use clap::Parser;
    use flexi_logger::Logger;
    use rummikub_ai::StrategyKind;
    use rummikub_ai::game::{GameState, TurnRecord, play_game};
    use rummikub_ai::strategy::{self, Budget, Strategy, StrategyConfig};
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(name = "rummikub-ai", version, about = "Rummikub AI self-play")]
    struct Args {
        /// Strategy for each seat, in turn order
        #[arg(short, long, value_enum, num_args = 2..=4, default_values_t = [StrategyKind::Mcts, StrategyKind::Greedy])]
        players: Vec<StrategyKind>,

        /// Seed for the deal and every decision
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// MCTS iterations per decision
        #[arg(short, long, default_value_t = 200)]
        iterations: u32,

        /// Wall-clock limit per decision, in milliseconds
        #[arg(short, long)]
        time_limit_ms: Option<u64>,

        /// JSON strategy config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many turns
        #[arg(short, long, default_value_t = 500)]
        max_turns: u32,

        /// Print one JSON record per turn and a JSON summary
        #[arg(long)]
        json: bool,
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let args = Args::parse();

        Logger::try_with_env_or_str("info")?
            .format(flexi_logger::colored_default_format)
            .start()?;
        log::info!("rummikub-ai build {}", env!("BUILD_COMMIT"));

        let mut config = match &args.config {
            Some(path) => StrategyConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => StrategyConfig::default(),
        };
        config.mcts.fit_to_players(args.players.len());

        let players: Vec<Box<dyn Strategy>> = args
            .players
            .iter()
            .map(|&kind| strategy::build(kind, &config))
            .collect();
        let budget = Budget {
            iterations: Some(args.iterations),
            time_limit_ms: args.time_limit_ms,
            seed: args.seed,
            cancel: None,
        };

        log::info!(
            "starting game: players {:?}, seed {}",
            args.players,
            args.seed
        );
        let state = GameState::deal(args.players.len(), args.seed);
        let json = args.json;
        let mut print_turn = |record: &TurnRecord| {
            if json {
                match serde_json::to_string(record) {
                    Ok(line) => println!("{line}"),
                    Err(e) => log::error!("could not serialize turn {}: {e}", record.turn),
                }
            } else {
                println!(
                    "{:>4}  P{} {:<6} {:<40} rack {:>2}",
                    record.turn, record.player, record.strategy, record.action, record.rack_size
                );
            }
        };
        let summary = play_game(state, &players, &budget, args.max_turns, &mut print_turn);

        if json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            match summary.winner {
                Some(player) if summary.blocked => println!(
                    "Blocked after {} turns; player {player} ({}) wins on points",
                    summary.turns, args.players[player]
                ),
                Some(player) => println!(
                    "Player {player} ({}) wins after {} turns",
                    args.players[player], summary.turns
                ),
                None if summary.tie => println!("Blocked after {} turns; tie on points", summary.turns),
                None => println!("No winner within {} turns", summary.turns),
            }
            println!("Tiles left: {:?}", summary.rack_sizes);
            println!("Points left: {:?}", summary.penalty_points);
        }
        Ok(())
    }
}
