use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::calibration::{BacktestCase, SetOutcome};
use crate::pipeline::{MatchInput, PlayerInput};
use crate::stats::{PlayerSurfaceStats, ReturnStats, ServeStats};
use crate::weights::Factor;

const SURFACES: [&str; 5] = [
    "Clay",
    "Grass",
    "Hardcourt indoor",
    "Hardcourt outdoor",
    "Red clay",
];

const FIRST_NAMES: [&str; 12] = [
    "Alex", "Bruno", "Carlos", "Daniil", "Emil", "Felix", "Gael", "Hugo", "Ivan", "Jannik",
    "Karen", "Lorenzo",
];

const LAST_NAMES: [&str; 12] = [
    "Arnaldi", "Baez", "Cerundolo", "Draper", "Etcheverry", "Fils", "Griekspoor", "Humbert",
    "Ivashka", "Jarry", "Khachanov", "Lehecka",
];

struct LatentPlayer {
    name: String,
    /// True per-set strength; only the outcome simulation sees it directly.
    skill: f64,
    ranking: u32,
    utr: f64,
}

fn latent_player(rng: &mut StdRng) -> LatentPlayer {
    let skill = rng.gen_range(0.25..0.75);
    let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
    LatentPlayer {
        name: format!("{first} {last}"),
        skill,
        ranking: ((1.0 - skill) * 400.0) as u32 + rng.gen_range(1..40),
        utr: 11.0 + skill * 5.0 + rng.gen_range(-0.4..0.4),
    }
}

fn noisy(rng: &mut StdRng, center: f64, spread: f64) -> f64 {
    (center + rng.gen_range(-spread..spread)).clamp(0.0, 1.0)
}

fn season_record(
    rng: &mut StdRng,
    player: &LatentPlayer,
    year: i32,
    surface: &str,
) -> PlayerSurfaceStats {
    let matches = if rng.gen_bool(0.1) {
        0
    } else {
        rng.gen_range(2..20)
    };
    let win_rate = noisy(rng, player.skill, 0.12);
    let sets_won = (matches as f64 * 2.2 * win_rate).round() as u32;
    let sets_lost = (matches as f64 * 2.2 * (1.0 - win_rate)).round() as u32;

    let mut record = PlayerSurfaceStats::new(year, surface, matches, win_rate).with_sets(sets_won, sets_lost);
    record.serve_stats = ServeStats {
        ace_rate: noisy(rng, 0.04 + player.skill * 0.08, 0.02),
        first_serve_pct: noisy(rng, 0.55 + player.skill * 0.1, 0.05),
    };
    record.return_stats = ReturnStats {
        first_serve_return_won: Some(noisy(rng, 0.2 + player.skill * 0.2, 0.05)),
        second_serve_return_won: Some(noisy(rng, 0.4 + player.skill * 0.2, 0.05)),
        break_points_converted: rng.gen_bool(0.8).then(|| noisy(rng, player.skill * 0.7, 0.1)),
    };
    record.mental_toughness_score = Some(noisy(rng, player.skill, 0.2));
    record.pressure_conversion_rate = Some(noisy(rng, player.skill, 0.2));
    record.ranking = Some(player.ranking);
    record.utr = Some(player.utr);
    record.current_year_match_count = rng.gen_range(0..40);
    for factor in [
        Factor::RecentForm,
        Factor::Momentum,
        Factor::PhysicalFactors,
        Factor::RankingAdvantage,
        Factor::TiebreakPerformance,
    ] {
        record.factors.insert(factor, noisy(rng, player.skill, 0.15));
    }
    record
}

fn player_input(rng: &mut StdRng, player: &LatentPlayer, season: i32) -> PlayerInput {
    let mut seasons = Vec::new();
    for year in (season - 2)..=season {
        for surface in SURFACES {
            if rng.gen_bool(0.75) {
                seasons.push(season_record(rng, player, year, surface));
            }
        }
    }
    PlayerInput {
        name: player.name.clone(),
        seasons,
    }
}

fn sample_match(rng: &mut StdRng, idx: usize, season: i32) -> (MatchInput, f64) {
    let a = latent_player(rng);
    let b = latent_player(rng);
    let tier = if rng.gen_bool(0.08) {
        "ATP Finals"
    } else {
        "Regular"
    };
    let surface = SURFACES[rng.gen_range(0..SURFACES.len())];
    let input = MatchInput {
        match_id: format!("synthetic-{season}-{idx:04}"),
        tournament_tier: tier.to_string(),
        surface_raw_label: surface.to_string(),
        player_a: player_input(rng, &a, season),
        player_b: player_input(rng, &b, season),
        ranking_a: rng.gen_bool(0.9).then_some(a.ranking),
        ranking_b: rng.gen_bool(0.9).then_some(b.ranking),
        utr_a: rng.gen_bool(0.85).then_some(a.utr),
        utr_b: rng.gen_bool(0.85).then_some(b.utr),
    };
    let set_p_a = 1.0 / (1.0 + (-6.0 * (a.skill - b.skill)).exp());
    (input, set_p_a)
}

/// Reproducible slate of synthetic matches for demos and benches.
pub fn generate_slate(seed: u64, count: usize, season: i32) -> Vec<MatchInput> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|idx| sample_match(&mut rng, idx, season).0)
        .collect()
}

/// Like [`generate_slate`], with a best-of-three result simulated from the
/// players' hidden strength.
pub fn generate_backtest(seed: u64, count: usize, season: i32) -> Vec<BacktestCase> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|idx| {
            let (input, set_p_a) = sample_match(&mut rng, idx, season);
            let outcome = simulate_best_of_three(&mut rng, set_p_a);
            BacktestCase { input, outcome }
        })
        .collect()
}

fn simulate_best_of_three(rng: &mut StdRng, set_p_a: f64) -> SetOutcome {
    let mut out = SetOutcome {
        sets_a: 0,
        sets_b: 0,
    };
    while out.sets_a < 2 && out.sets_b < 2 {
        if rng.gen_bool(set_p_a.clamp(0.0, 1.0)) {
            out.sets_a += 1;
        } else {
            out.sets_b += 1;
        }
    }
    out
}
