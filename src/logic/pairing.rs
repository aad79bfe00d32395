//! Swiss pairing: score groups, Dutch top/bottom split, bye selection and colour allocation.

use crate::models::{Pairing, Participant};
use std::cmp::Ordering;

/// Added to a candidate's cost when both players are due the same colour.
const COLOR_CLASH_PENALTY: i64 = 100;

/// Number of rounds for a field of `participant_count` players.
pub fn compute_rounds(participant_count: usize) -> u32 {
    match participant_count {
        0 | 1 => 0,
        2 => 1,
        3..=4 => 2,
        5..=8 => 3,
        9..=16 => 4,
        17..=32 => 5,
        33..=64 => 6,
        65..=128 => 7,
        129..=256 => 8,
        n => (n as f64).log2().ceil() as u32,
    }
}

/// Pairing priority inside a score group: buchholz, then Sonneborn-Berger, then rating.
/// Player id breaks exact ties so the order is deterministic.
fn priority_order(a: &Participant, b: &Participant) -> Ordering {
    b.buchholz
        .total_cmp(&a.buchholz)
        .then_with(|| b.sonneborn_berger.total_cmp(&a.sonneborn_berger))
        .then_with(|| b.rating.cmp(&a.rating))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Split the roster into score groups, highest score first, each group in priority order.
fn score_groups(roster: &[Participant]) -> Vec<Vec<&Participant>> {
    let mut sorted: Vec<&Participant> = roster.iter().collect();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| priority_order(a, b)));

    let mut groups: Vec<Vec<&Participant>> = Vec::new();
    for p in sorted {
        match groups.last_mut() {
            Some(group) if group[0].score == p.score => group.push(p),
            _ => groups.push(vec![p]),
        }
    }
    groups
}

/// Remove the bye recipient: the lowest-priority member who has not had a bye yet,
/// or the lowest-priority member if everyone has.
fn take_bye<'a>(group: &mut Vec<&'a Participant>) -> Option<&'a Participant> {
    let idx = group
        .iter()
        .rposition(|p| p.byes == 0)
        .or_else(|| group.len().checked_sub(1))?;
    Some(group.remove(idx))
}

fn color_penalty(a: &Participant, b: &Participant) -> i64 {
    let (ca, cb) = (a.color_balance(), b.color_balance());
    if (ca > 0 && cb > 0) || (ca < 0 && cb < 0) {
        COLOR_CLASH_PENALTY
    } else {
        0
    }
}

/// Lower is better: rating distance plus a colour-balance correction.
fn candidate_cost(a: &Participant, b: &Participant) -> i64 {
    (i64::from(a.rating) - i64::from(b.rating)).abs() + color_penalty(a, b)
}

/// Returns (white, black). The player who has had black more often gets white;
/// otherwise the higher rated, otherwise `first`.
fn assign_colors<'a>(
    first: &'a Participant,
    second: &'a Participant,
) -> (&'a Participant, &'a Participant) {
    match first.color_balance().cmp(&second.color_balance()) {
        Ordering::Less => (first, second),
        Ordering::Greater => (second, first),
        Ordering::Equal if second.rating > first.rating => (second, first),
        Ordering::Equal => (first, second),
    }
}

/// Pair an even-sized group top half against bottom half.
fn pair_group(group: &[&Participant], round_number: u32, board: &mut u32, out: &mut Vec<Pairing>) {
    let half = group.len() / 2;
    let (top, bottom) = group.split_at(half);
    let mut bottom: Vec<&Participant> = bottom.to_vec();

    for &p in top {
        let legal = bottom
            .iter()
            .enumerate()
            .filter(|(_, c)| !p.has_met(&c.player_id))
            .min_by_key(|(_, c)| candidate_cost(p, c))
            .map(|(i, _)| i);

        let (idx, rematch) = match legal {
            Some(i) => (i, false),
            None => {
                let Some(i) = bottom
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| candidate_cost(p, c))
                    .map(|(i, _)| i)
                else {
                    continue;
                };
                log::warn!(
                    "Round {}: no unplayed opponent for {}, pairing a rematch against {}",
                    round_number,
                    p.player_id,
                    bottom[i].player_id
                );
                (i, true)
            }
        };

        let opponent = bottom.remove(idx);
        let (white, black) = assign_colors(p, opponent);
        *board += 1;
        out.push(Pairing::game(*board, white.id, black.id, rematch));
    }
}

/// Generate pairings for `round_number` from the current roster.
///
/// 1. Group by score (descending); each group ordered by buchholz, Sonneborn-Berger, rating.
/// 2. An odd group floats its lowest-priority member down into the next group.
///    The last group, if odd, gives up a bye (preferring players without one).
/// 3. Each group is split into halves; every top-half player takes the cheapest bottom-half
///    opponent they have not met. With none left, a rematch is paired and flagged.
/// 4. Boards are numbered densely in production order; the bye comes last.
///
/// Scores are not touched here. Byes are credited when the round starts.
pub fn generate_pairings(roster: &[Participant], round_number: u32) -> Vec<Pairing> {
    let groups = score_groups(roster);
    let last = groups.len().saturating_sub(1);

    let mut pairings = Vec::with_capacity(roster.len() / 2 + 1);
    let mut board = 0u32;
    let mut floater: Option<&Participant> = None;
    let mut bye: Option<&Participant> = None;

    for (i, mut group) in groups.into_iter().enumerate() {
        if let Some(f) = floater.take() {
            group.insert(0, f);
        }
        if group.len() % 2 == 1 {
            if i == last {
                bye = take_bye(&mut group);
            } else {
                floater = group.pop();
            }
        }
        pair_group(&group, round_number, &mut board, &mut pairings);
    }

    if let Some(p) = bye {
        board += 1;
        pairings.push(Pairing::bye(board, p.id));
    }

    log::info!(
        "Round {} paired: {} game(s), {} bye(s)",
        round_number,
        pairings.iter().filter(|p| !p.is_bye).count(),
        pairings.iter().filter(|p| p.is_bye).count()
    );
    pairings
}
