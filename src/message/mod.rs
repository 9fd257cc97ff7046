//! Chat-ready HTML body construction with a static-part cache.
//!
//! Rendering splits per-event static parts (teams, tournament, date, deep
//! link) from per-pick dynamic parts (stake indicator, odds, minimum odds).
//! Static parts are cached under `team1:team2:event_unix:bookmaker` with a
//! short TTL and LRU eviction; dynamic parts are always composed fresh.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::{Decimal, RoundingStrategy};
use time::{OffsetDateTime, UtcOffset, Weekday};

use crate::calc::StakeTier;
use crate::domain::market::MarketKind;
use crate::domain::pick::normalize_team;
use crate::domain::Surebet;

/// Cached per-event fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StaticParts {
    teams_line: String,
    tournament_line: String,
    date_line: String,
    link_line: String,
}

struct CacheEntry {
    parts: StaticParts,
    expires_at: Instant,
    last_used: u64,
}

/// TTL + LRU bounded cache for static parts.
struct PartsCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    use_counter: u64,
}

impl PartsCache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            ttl,
            use_counter: 0,
        }
    }

    fn get(&mut self, key: &str) -> Option<StaticParts> {
        self.use_counter += 1;
        let counter = self.use_counter;
        match self.entries.get_mut(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.last_used = counter;
                Some(entry.parts.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&mut self, key: String, parts: StaticParts) {
        let now = Instant::now();
        if self.entries.len() >= self.capacity {
            self.entries.retain(|_, entry| entry.expires_at > now);
        }
        if self.entries.len() >= self.capacity {
            // Still full after dropping expired entries: evict the least
            // recently used one.
            if let Some(lru_key) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&lru_key);
            }
        }
        self.use_counter += 1;
        self.entries.insert(
            key,
            CacheEntry {
                parts,
                expires_at: now + self.ttl,
                last_used: self.use_counter,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Builds the HTML message body for a pick.
pub struct MessageBuilder {
    cache: Mutex<PartsCache>,
    display_offset: UtcOffset,
}

impl MessageBuilder {
    /// Build with cache bounds and the fixed display offset for dates.
    pub fn new(cache_ttl: Duration, cache_capacity: usize, display_offset_hours: i8) -> Self {
        Self {
            cache: Mutex::new(PartsCache::new(cache_capacity, cache_ttl)),
            display_offset: UtcOffset::from_hms(display_offset_hours, 0, 0)
                .unwrap_or(UtcOffset::UTC),
        }
    }

    /// Compose the full body: dynamic header, then cached static parts.
    pub fn build(&self, surebet: &Surebet, tier: StakeTier, min_odds: Decimal) -> String {
        let pick = &surebet.soft_prong;

        let header = format!(
            "<b>{} {} @{} (\u{1F53B}{})</b>",
            tier.indicator(),
            market_header(pick),
            escape_text(&pick.odds.to_string()),
            escape_text(
                &min_odds
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                    .to_string()
            ),
        );

        let parts = self.static_parts(surebet);

        let mut body = format!(
            "{}\n\n{}\n{}\n{}",
            header, parts.teams_line, parts.tournament_line, parts.date_line
        );
        if !parts.link_line.is_empty() {
            body.push_str("\n\n");
            body.push_str(&parts.link_line);
        }
        body
    }

    /// Entries currently cached; used by the stats log.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn static_parts(&self, surebet: &Surebet) -> StaticParts {
        let pick = &surebet.soft_prong;
        let key = format!(
            "{}:{}:{}:{}",
            normalize_team(&pick.teams.0),
            normalize_team(&pick.teams.1),
            pick.event_time.unix_timestamp(),
            pick.bookmaker,
        );

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(parts) = cache.get(&key) {
                return parts;
            }
        }

        let parts = self.render_static(surebet);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, parts.clone());
        }
        parts
    }

    fn render_static(&self, surebet: &Surebet) -> StaticParts {
        let pick = &surebet.soft_prong;

        let team1 = escape_text(&title_case(&clean_text(&pick.teams.0)));
        let team2 = escape_text(&title_case(&clean_text(&pick.teams.1)));
        let emoji = sport_emoji(&pick.sport);
        let teams_line = if emoji.is_empty() {
            format!("<code>{team1}</code> vs <code>{team2}</code>")
        } else {
            format!("{emoji} <code>{team1}</code> vs <code>{team2}</code>")
        };

        let tournament_line = format!(
            "\u{1F3C6} {} ({})",
            escape_text(&title_case(&clean_text(&pick.tournament))),
            escape_text(&title_case(&clean_text(&pick.sport))),
        );

        let date_line = self.format_date(pick.event_time);

        let link_line = match pick.link.as_deref().map(adjust_domain) {
            Some(url) if !url.is_empty() => format!(
                "\u{1F517} <a href=\"{}\">{}</a>",
                escape_attr(&url),
                escape_text(&url)
            ),
            _ => String::new(),
        };

        StaticParts {
            teams_line,
            tournament_line,
            date_line,
            link_line,
        }
    }

    fn format_date(&self, event_time: OffsetDateTime) -> String {
        let local = event_time.to_offset(self.display_offset);
        format!(
            "\u{1F4C5} {:02}/{:02}/{} ({} {:02}:{:02})",
            local.day(),
            u8::from(local.month()),
            local.year(),
            spanish_day(local.weekday()),
            local.hour(),
            local.minute(),
        )
    }
}

/// Dynamic market description for the header line, upper-cased.
fn market_header(pick: &crate::domain::Pick) -> String {
    let market = &pick.market;
    let mut parts: Vec<String> = Vec::new();

    if market.negated {
        parts.push("NOT".to_string());
    }
    parts.push(market_label(market.kind).to_string());

    for field in [&market.condition, &market.base, &market.game, &market.period] {
        if let Some(value) = field {
            let cleaned = clean_text(value);
            if !cleaned.is_empty() {
                parts.push(escape_text(&cleaned.to_uppercase()));
            }
        }
    }

    parts.join(" ")
}

/// Canonical display label per market kind.
fn market_label(kind: MarketKind) -> &'static str {
    use MarketKind::*;
    match kind {
        Win1 | WinOnly1 => "WIN1",
        Win2 | WinOnly2 => "WIN2",
        Draw => "DRAW",
        DoubleChance1X => "1X",
        DoubleChanceX2 => "X2",
        DoubleChance12 => "12",
        Over => "OVER",
        Under => "UNDER",
        EOver => "E OVER",
        EUnder => "E UNDER",
        Ah1 => "AH1",
        Ah2 => "AH2",
        Odd => "ODD",
        Even => "EVEN",
        Yes => "YES",
        No => "NO",
        Win1RetX => "DNB1",
        Win2RetX => "DNB2",
        Win1ToNil => "WIN1 TO NIL",
        Win2ToNil => "WIN2 TO NIL",
        CleanSheet1 => "CLEAN SHEET 1",
        CleanSheet2 => "CLEAN SHEET 2",
        Win1Qualify => "WIN1 QUALIFY",
        Win2Qualify => "WIN2 QUALIFY",
        BetweenMarginH1 => "MARGIN H1",
        BetweenMarginH2 => "MARGIN H2",
        Unknown => "?",
    }
}

/// Filler words stripped from market and team text.
const NOISE_WORDS: &[&str] = &[
    "point",
    "points",
    "overall",
    "regular",
    "overtime",
    "regulartime",
    "time",
    "goal",
    "goals",
    "set",
    "total",
    "game",
    "games",
    "match",
    "matches",
];

/// Lowercase, strip noise words, collapse whitespace. HTML escaping is a
/// separate step so case transforms cannot mangle entities.
fn clean_text(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let kept: Vec<&str> = lowered
        .split_whitespace()
        .filter(|word| !NOISE_WORDS.contains(word))
        .collect();
    kept.join(" ")
}

/// Escape HTML text content (quotes untouched).
fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape an HTML attribute value.
fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// First-letter capitalization per word.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-bookmaker deep-link adjustment; unknown hosts pass through.
fn adjust_domain(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    if url.contains("bet365") {
        let url = url.replace("bet365.com", "bet365.es");
        if let Some((domain, path)) = url.split_once(".es") {
            return format!("{}.es{}", domain, path.to_uppercase());
        }
        return url;
    }

    if url.contains("betway") {
        return url.replace(
            "sports.betway.com/en/sports",
            "sports.betway.es/es/sports",
        );
    }

    if url.contains("bwin") {
        return url.replace("sports.bwin.com/en/", "sports.bwin.es/es/");
    }

    if url.contains("sportswidget.versus.es") {
        return url.replace(
            "sportswidget.versus.es/sports",
            "www.versus.es/apuestas/sports",
        );
    }

    if url.contains("versus.es/sports") {
        return url.replace("versus.es/sports", "www.versus.es/apuestas/sports");
    }

    if url.contains("pokerstars") {
        return url.replace("pokerstars.uk/", "pokerstars.es/");
    }

    url.to_string()
}

/// Sport emoji for the teams line; empty for unmapped sports.
fn sport_emoji(sport: &str) -> &'static str {
    match sport.to_lowercase().as_str() {
        "football" => "\u{26BD}\u{FE0F}",
        "basketball" => "\u{1F3C0}",
        "americanfootball" => "\u{1F3C8}",
        "rugby" => "\u{1F3C9}",
        "hockey" => "\u{1F3D2}",
        "tennis" => "\u{1F3BE}",
        "tabletennis" => "\u{1F3D3}",
        "handball" => "\u{1F93E}",
        "baseball" => "\u{26BE}\u{FE0F}",
        "volleyball" => "\u{1F3D0}",
        "e_football" => "\u{1F3AE}",
        "darts" => "\u{1F3AF}",
        _ => "",
    }
}

fn spanish_day(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "Lunes",
        Weekday::Tuesday => "Martes",
        Weekday::Wednesday => "Mi\u{e9}rcoles",
        Weekday::Thursday => "Jueves",
        Weekday::Friday => "Viernes",
        Weekday::Saturday => "S\u{e1}bado",
        Weekday::Sunday => "Domingo",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Market;
    use crate::domain::{Odds, Pick, Profit, Surebet};
    use rust_decimal_macros::dec;

    fn prong(bookmaker: &str, kind: MarketKind, odds: Decimal, link: Option<&str>) -> Pick {
        Pick {
            teams: ("Team A".to_string(), "Team B".to_string()),
            tournament: "La Liga".to_string(),
            sport: "Football".to_string(),
            event_time: OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap(),
            market: Market {
                kind,
                condition: Some("2.5".to_string()),
                period: None,
                base: None,
                game: None,
                variety: "2.5".to_string(),
                negated: false,
            },
            odds: Odds::new(odds).unwrap(),
            bookmaker: bookmaker.to_string(),
            link: link.map(|s| s.to_string()),
        }
    }

    fn test_surebet(link: Option<&str>) -> Surebet {
        Surebet::new(
            prong("pinnaclesports", MarketKind::Under, dec!(2.00), None),
            prong("retabet_apuestas", MarketKind::Over, dec!(2.10), link),
            Profit::new(dec!(2.38)).unwrap(),
            1,
            "created_at".to_string(),
            None,
        )
        .unwrap()
    }

    fn builder() -> MessageBuilder {
        MessageBuilder::new(Duration::from_secs(60), 16, 1)
    }

    #[test]
    fn body_layout_dynamic_then_static() {
        let body = builder().build(&test_surebet(None), StakeTier::MediumHigh, dec!(1.9607843));

        assert!(body.starts_with("<b>🟡 OVER 2.5 @2.10 (🔻1.96)</b>\n\n"));
        assert!(body.contains("<code>Team A</code> vs <code>Team B</code>"));
        assert!(body.contains("🏆 La Liga (Football)"));
        assert!(body.contains("📅 "));
        assert!(!body.contains("<a href"));
    }

    #[test]
    fn rendering_is_idempotent_given_cache_state() {
        let builder = builder();
        let surebet = test_surebet(Some("https://example.test/e/1"));

        let first = builder.build(&surebet, StakeTier::High, dec!(1.96));
        let second = builder.build(&surebet, StakeTier::High, dec!(1.96));
        assert_eq!(first, second);
    }

    #[test]
    fn dynamic_parts_change_without_touching_cache() {
        let builder = builder();
        let surebet = test_surebet(None);

        let yellow = builder.build(&surebet, StakeTier::MediumHigh, dec!(1.96));
        let green = builder.build(&surebet, StakeTier::High, dec!(1.96));
        assert_ne!(yellow, green);
        assert!(green.contains("🟢"));
        assert_eq!(builder.cache_len(), 1);
    }

    #[test]
    fn link_is_adjusted_and_escaped() {
        let surebet = test_surebet(Some("https://www.bet365.com/dl/sports?a=1&b=2"));
        let body = builder().build(&surebet, StakeTier::High, dec!(1.96));
        assert!(body.contains("bet365.es"));
        assert!(body.contains("/DL/SPORTS?A=1&amp;B=2"));
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let builder = MessageBuilder::new(Duration::from_secs(60), 2, 1);
        let mut surebets = Vec::new();
        for i in 0..3 {
            let mut surebet = test_surebet(None);
            surebet.soft_prong.teams.0 = format!("Team {i}");
            surebets.push(surebet);
        }
        for surebet in &surebets {
            builder.build(surebet, StakeTier::High, dec!(1.96));
        }
        assert!(builder.cache_len() <= 2);
    }

    #[test]
    fn html_is_escaped_in_team_names() {
        let mut surebet = test_surebet(None);
        surebet.soft_prong.teams.0 = "AC <Milan> & Co".to_string();
        let body = builder().build(&surebet, StakeTier::High, dec!(1.96));
        assert!(body.contains("&lt;milan&gt;"));
        assert!(!body.contains("<Milan>"));
    }

    #[test]
    fn adjust_domain_table() {
        assert_eq!(
            adjust_domain("https://www.bet365.com/dl/x"),
            "https://www.bet365.es/DL/X"
        );
        assert_eq!(
            adjust_domain("https://sports.betway.com/en/sports/evt/1"),
            "https://sports.betway.es/es/sports/evt/1"
        );
        assert_eq!(
            adjust_domain("https://sports.bwin.com/en/sports/x"),
            "https://sports.bwin.es/es/sports/x"
        );
        assert_eq!(
            adjust_domain("https://www.pokerstars.uk/sports/e/9"),
            "https://www.pokerstars.es/sports/e/9"
        );
        // Unknown bookmakers pass through unchanged.
        assert_eq!(
            adjust_domain("https://www.retabet.es/apuestas/e/3"),
            "https://www.retabet.es/apuestas/e/3"
        );
    }

    #[test]
    fn clean_text_strips_noise_words() {
        assert_eq!(clean_text("Total Points Overall"), "");
        assert_eq!(clean_text("First Half Goals"), "first half");
        assert_eq!(clean_text("Regular Time"), "");
    }

    #[test]
    fn date_line_uses_display_offset() {
        let builder = builder();
        // 1900000000 = 2030-03-17 17:46:40 UTC -> 18:46 at +01:00.
        let line = builder.format_date(OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap());
        assert_eq!(line, "📅 17/03/2030 (Domingo 18:46)");
    }
}
