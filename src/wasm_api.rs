use crate::decompose::decompose;
use crate::strategy::{self, Budget, StrategyConfig, StrategyKind};
use crate::{BoardState, Move, Rack, SetKind, Tile, TileCounts, TileSet, apply_move};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in the browser console
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// JSON-serializable representation of a set on the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SetJson {
    #[serde(rename = "group")]
    Group { tiles: Vec<String> },
    #[serde(rename = "run")]
    Run { tiles: Vec<String> },
}

/// JSON-serializable representation of a move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum MoveJson {
    #[serde(rename = "place")]
    Place {
        board: Vec<SetJson>,
        consumed: Vec<String>,
    },
    #[serde(rename = "draw")]
    Draw,
    #[serde(rename = "pass")]
    Pass,
}

/// Envelope of every API answer
#[derive(Serialize)]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State after a successful `apply_move_json`
#[derive(Debug, Serialize)]
pub struct AppliedJson {
    pub board: Vec<SetJson>,
    pub rack: Vec<String>,
    pub has_melded: bool,
}

fn respond<T: Serialize>(result: Result<T, String>) -> String {
    let envelope = match result {
        Ok(value) => ApiResult {
            success: true,
            result: Some(value),
            error: None,
        },
        Err(e) => ApiResult {
            success: false,
            result: None,
            error: Some(e),
        },
    };
    serde_json::to_string(&envelope)
        .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"Serialization error: {}"}}"#, e))
}

/// Partition tiles into sets
///
/// # Arguments
/// * `tiles` - JSON array of tile strings (e.g., ["r1", "r2", "r3", "j"])
///
/// # Returns
/// JSON with `result` the list of sets, or `null` if the tiles cannot all be placed
#[wasm_bindgen]
pub fn decompose_tiles(tiles: &str) -> String {
    respond(decompose_internal(tiles))
}

fn decompose_internal(tiles: &str) -> Result<Option<Vec<SetJson>>, String> {
    let tiles = tiles_from_json(tiles)?;
    Ok(decompose(&tiles).map(|sets| sets.iter().map(set_to_json).collect()))
}

/// Ask an AI strategy for a move
///
/// # Arguments
/// * `board` - JSON array of set objects (e.g., [{"type": "run", "tiles": ["r1", "r2", "r3"]}])
/// * `rack` - JSON array of tile strings
/// * `has_melded` - Whether the player already made the initial meld
/// * `strategy` - "random", "greedy" or "mcts"
/// * `budget` - JSON budget, e.g. {"iterations": 200, "time_limit_ms": 500, "seed": 7}
/// * `config` - JSON strategy config; `""` for defaults
#[wasm_bindgen]
pub fn choose_move_json(
    board: &str,
    rack: &str,
    has_melded: bool,
    strategy: &str,
    budget: &str,
    config: &str,
) -> String {
    respond(choose_internal(board, rack, has_melded, strategy, budget, config))
}

fn choose_internal(
    board: &str,
    rack: &str,
    has_melded: bool,
    strategy: &str,
    budget: &str,
    config: &str,
) -> Result<MoveJson, String> {
    let board = board_from_json(board)?;
    let rack = rack_from_json(rack, has_melded)?;
    let kind: StrategyKind = strategy.parse().map_err(|e| format!("{e}"))?;
    let budget: Budget = if budget.trim().is_empty() {
        Budget::default()
    } else {
        serde_json::from_str(budget).map_err(|e| format!("Invalid budget JSON: {e}"))?
    };
    let config = if config.trim().is_empty() {
        StrategyConfig::default()
    } else {
        StrategyConfig::from_json(config).map_err(|e| e.to_string())?
    };

    let mv = strategy::choose_move_with(&board, &rack, kind, &budget, &config);
    Ok(move_to_json(&mv))
}

/// Validate and apply a move
///
/// # Arguments
/// * `board`, `rack`, `has_melded` - Current state, as for `choose_move_json`
/// * `mv` - JSON move, as returned by `choose_move_json`
///
/// # Returns
/// JSON with the new board and rack, or the rejection reason
#[wasm_bindgen]
pub fn apply_move_json(board: &str, rack: &str, has_melded: bool, mv: &str) -> String {
    respond(apply_internal(board, rack, has_melded, mv))
}

fn apply_internal(board: &str, rack: &str, has_melded: bool, mv: &str) -> Result<AppliedJson, String> {
    let board = board_from_json(board)?;
    let rack = rack_from_json(rack, has_melded)?;
    let mv: MoveJson = serde_json::from_str(mv).map_err(|e| format!("Invalid move JSON: {e}"))?;
    let mv = move_from_json(mv, &board)?;

    let (board, rack) = apply_move(&board, &rack, &mv).map_err(|e| e.to_string())?;
    Ok(AppliedJson {
        board: board.sets().map(set_to_json).collect(),
        rack: rack.tiles().to_vec().iter().map(Tile::to_string).collect(),
        has_melded: rack.has_melded(),
    })
}

fn tiles_from_json(tiles: &str) -> Result<TileCounts, String> {
    let strs: Vec<String> =
        serde_json::from_str(tiles).map_err(|e| format!("Invalid tiles JSON: {e}"))?;
    parse_tile_strings(&strs)
}

// Rejects more copies of a tile than a full set holds
fn parse_tile_strings(strs: &[String]) -> Result<TileCounts, String> {
    let tiles: TileCounts = strs
        .iter()
        .map(|s| s.parse::<Tile>().map_err(|e| format!("Invalid tile {s:?}: {e}")))
        .collect::<Result<_, _>>()?;
    let full = TileCounts::full_set();
    let excess = tiles.iter().find(|&(tile, &count)| count > full.count(tile));
    match excess {
        Some((tile, &count)) => Err(format!(
            "{count} copies of {tile}, a set has {}",
            full.count(tile)
        )),
        None => Ok(tiles),
    }
}

fn rack_from_json(rack: &str, has_melded: bool) -> Result<Rack, String> {
    let tiles = tiles_from_json(rack)?;
    Ok(if has_melded {
        Rack::melded(tiles)
    } else {
        Rack::new(tiles)
    })
}

fn board_from_json(board: &str) -> Result<BoardState, String> {
    let sets: Vec<SetJson> =
        serde_json::from_str(board).map_err(|e| format!("Invalid board JSON: {e}"))?;
    sets.into_iter()
        .map(set_from_json)
        .collect::<Result<Vec<_>, _>>()
        .map(BoardState::from_sets)
}

/// Convert JSON set to a validated TileSet of the declared kind
fn set_from_json(set: SetJson) -> Result<TileSet, String> {
    let (kind, tile_strs) = match set {
        SetJson::Group { tiles } => (SetKind::Group, tiles),
        SetJson::Run { tiles } => (SetKind::Run, tiles),
    };
    let tiles = tile_strs
        .iter()
        .map(|s| s.parse::<Tile>().map_err(|e| format!("Invalid tile {s:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let set = TileSet::new(tiles).map_err(|e| format!("Invalid set [{}]: {e}", tile_strs.join(" ")))?;
    if set.kind() != kind {
        return Err(format!("Set [{set}] is a {:?}, not a {kind:?}", set.kind()));
    }
    Ok(set)
}

fn set_to_json(set: &TileSet) -> SetJson {
    let tiles = set.tiles().iter().map(Tile::to_string).collect();
    match set.kind() {
        SetKind::Group => SetJson::Group { tiles },
        SetKind::Run => SetJson::Run { tiles },
    }
}

fn move_from_json(mv: MoveJson, before: &BoardState) -> Result<Move, String> {
    Ok(match mv {
        MoveJson::Place { board, consumed } => {
            let sets = board
                .into_iter()
                .map(set_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Move::Place {
                board: before.rebuild(sets),
                consumed: parse_tile_strings(&consumed)?,
            }
        }
        MoveJson::Draw => Move::Draw,
        MoveJson::Pass => Move::Pass,
    })
}

fn move_to_json(mv: &Move) -> MoveJson {
    match mv {
        Move::Place { board, consumed } => MoveJson::Place {
            board: board.sets().map(set_to_json).collect(),
            consumed: consumed.to_vec().iter().map(Tile::to_string).collect(),
        },
        Move::Draw => MoveJson::Draw,
        Move::Pass => MoveJson::Pass,
    }
}

/// Get the git commit hash that this WASM module was built from
///
/// Returns the first 8 characters of the commit hash, or "unknown" if not available
#[wasm_bindgen]
pub fn get_build_commit() -> String {
    env!("BUILD_COMMIT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_decompose_tiles() {
        let out = parse(&decompose_tiles(r#"["r1", "r2", "r3"]"#));
        assert_eq!(out["success"], true);
        assert_eq!(out["result"], json!([{"type": "run", "tiles": ["r1", "r2", "r3"]}]));

        let out = parse(&decompose_tiles(r#"["r1", "r2"]"#));
        assert_eq!(out["success"], true);
        assert_eq!(out["result"], Value::Null);

        let out = parse(&decompose_tiles(r#"["r99"]"#));
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().contains("r99"));
    }

    #[test]
    fn test_too_many_copies_rejected() {
        let out = parse(&decompose_tiles(r#"["r1", "r1", "r1"]"#));
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().contains("3 copies of r1"));

        let many = serde_json::to_string(&vec!["j"; 300]).unwrap();
        let out = parse(&decompose_tiles(&many));
        assert_eq!(out["success"], false);
    }

    #[test]
    fn test_choose_then_apply() {
        let board = r#"[{"type": "run", "tiles": ["r4", "r5", "r6"]}]"#;
        let rack = r#"["r7", "b9", "y9", "k9", "b2"]"#;
        let out = parse(&choose_move_json(board, rack, true, "greedy", r#"{"seed": 3}"#, ""));
        assert_eq!(out["success"], true);
        assert_eq!(out["result"]["action"], "place");

        let mv = out["result"].to_string();
        let applied = parse(&apply_move_json(board, rack, true, &mv));
        assert_eq!(applied["success"], true);
        assert_eq!(applied["result"]["rack"], json!(["b2"]));
    }

    #[test]
    fn test_apply_rejects_low_initial_meld() {
        let mv = json!({
            "action": "place",
            "board": [{"type": "run", "tiles": ["r1", "r2", "r3"]}],
            "consumed": ["r1", "r2", "r3"],
        });
        let out = parse(&apply_move_json("[]", r#"["r1", "r2", "r3"]"#, false, &mv.to_string()));
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().contains("initial meld"));
    }

    #[test]
    fn test_declared_kind_must_match() {
        let board = r#"[{"type": "group", "tiles": ["r1", "r2", "r3"]}]"#;
        let out = parse(&choose_move_json(board, "[]", true, "greedy", "", ""));
        assert_eq!(out["success"], false);
    }

    #[test]
    fn test_unknown_strategy() {
        let out = parse(&choose_move_json("[]", "[]", true, "minimax", "", ""));
        assert_eq!(out["success"], false);
    }
}
