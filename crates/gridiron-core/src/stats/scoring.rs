// DraftKings classic fantasy scoring.

use super::StatRecord;

/// Column holding a row's realized fantasy points. Feature builds use it as
/// the training target.
pub const FANTASY_POINTS: &str = "fantasy_points";

/// Fantasy points for one player-game from the box score line.
///
/// Missing stats count as zero. Bonus thresholds are strict (a 300-yard
/// passing day earns no bonus, 301 does).
pub fn offense_fantasy_points(row: &StatRecord) -> f64 {
    let s = |name: &str| row.stat_or_zero(name);
    let bonus = |yards: f64, threshold: f64| if yards > threshold { 3.0 } else { 0.0 };

    let pass_yds = s("pass_yds");
    let rush_yds = s("rush_yds");
    let rec_yds = s("rec_yds");

    4.0 * s("pass_td") + 0.04 * pass_yds + bonus(pass_yds, 300.0) - s("pass_int")
        + 6.0 * s("rush_td")
        + 0.1 * rush_yds
        + bonus(rush_yds, 100.0)
        + 6.0 * s("rec_td")
        + 0.1 * rec_yds
        + bonus(rec_yds, 100.0)
        + s("rec")
        - s("fumbles_lost")
}

/// Points-allowed bracket for team defenses.
pub fn points_allowed_score(points: f64) -> f64 {
    if points == 0.0 {
        10.0
    } else if points <= 6.0 {
        7.0
    } else if points <= 13.0 {
        4.0
    } else if points <= 20.0 {
        1.0
    } else if points <= 27.0 {
        0.0
    } else if points <= 34.0 {
        -1.0
    } else {
        -4.0
    }
}

/// Fantasy points for a team defense. Takeaways come from the opponent's
/// offensive line for the same game.
pub fn defense_fantasy_points(
    sacks: f64,
    interceptions: f64,
    fumbles_recovered: f64,
    points_allowed: f64,
) -> f64 {
    sacks + 2.0 * interceptions + 2.0 * fumbles_recovered + points_allowed_score(points_allowed)
}
