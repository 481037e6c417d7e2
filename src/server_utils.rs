use crate::constants::CHAT_MAX_CHARS;
use crate::rng::Rng;

const ADJECTIVES: [&str; 24] = [
    "Brave", "Calm", "Clever", "Cosmic", "Dizzy", "Eager", "Fancy", "Fuzzy", "Gentle", "Happy",
    "Jolly", "Lucky", "Mellow", "Nimble", "Plucky", "Quiet", "Rapid", "Shiny", "Sleepy", "Sneaky",
    "Sunny", "Swift", "Witty", "Zesty",
];

const ANIMALS: [&str; 24] = [
    "Badger", "Beaver", "Camel", "Cobra", "Dingo", "Falcon", "Ferret", "Gecko", "Heron", "Ibis",
    "Jackal", "Koala", "Lemur", "Lynx", "Marmot", "Newt", "Otter", "Panda", "Puffin", "Quokka",
    "Raven", "Stoat", "Tapir", "Walrus",
];

pub fn make_player_name(rng: &mut Rng) -> String {
    let adjective = rng.pick(&ADJECTIVES).copied().unwrap_or("Nameless");
    let animal = rng.pick(&ANIMALS).copied().unwrap_or("Player");
    format!("{adjective}{animal}")
}

pub fn sanitize_chat(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .chars()
            .filter(|ch| !ch.is_control())
            .take(CHAT_MAX_CHARS)
            .collect(),
    )
}

pub fn player_order_key(player_id: &str) -> u64 {
    player_id
        .rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse::<u64>().ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_names_combine_two_words() {
        let mut rng = Rng::new(5);
        for _ in 0..50 {
            let name = make_player_name(&mut rng);
            assert!(ADJECTIVES.iter().any(|adj| name.starts_with(adj)));
            assert!(ANIMALS.iter().any(|animal| name.ends_with(animal)));
        }
    }

    #[test]
    fn sanitize_chat_trims_and_caps() {
        assert_eq!(sanitize_chat(""), None);
        assert_eq!(sanitize_chat("   "), None);
        assert_eq!(sanitize_chat("  hi there "), Some("hi there".to_string()));
        assert_eq!(sanitize_chat("a\u{7}b"), Some("ab".to_string()));
        let long = "x".repeat(CHAT_MAX_CHARS + 50);
        assert_eq!(sanitize_chat(&long).map(|s| s.len()), Some(CHAT_MAX_CHARS));
    }

    #[test]
    fn player_order_key_uses_numeric_suffix() {
        assert!(player_order_key("player_2") < player_order_key("player_10"));
        assert_eq!(player_order_key("nobody"), u64::MAX);
    }
}
