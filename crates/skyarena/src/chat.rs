//! Chat routing between the lobby and running arenas.
//!
//! Lobby chat never reaches players inside an arena. Chat from inside an
//! arena goes to its usual audience and is also mirrored to online
//! moderators, prefixed with the arena name.

use skyarena_arena::ArenaManager;
use skyarena_protocol::{HostAction, PlayerName};

use crate::presence::Presence;

/// Decides who sees a chat line. Returns the actions to hand the host.
pub fn route_chat(
    arenas: &ArenaManager,
    presence: &Presence,
    sender: &PlayerName,
    message: &str,
    recipients: Vec<PlayerName>,
) -> Vec<HostAction> {
    let in_arena = |player: &PlayerName| {
        presence
            .world_of(player)
            .and_then(|world| arenas.resolve_arena_for(player, world))
    };

    let Some(arena) = in_arena(sender) else {
        let recipients: Vec<PlayerName> = recipients
            .into_iter()
            .filter(|recipient| in_arena(recipient).is_none())
            .collect();
        return vec![HostAction::Chat {
            recipients,
            message: message.to_string(),
        }];
    };

    let mut actions = vec![HostAction::Chat {
        recipients,
        message: message.to_string(),
    }];
    let relay = format!("{} > {message}", arena.name());
    actions.extend(
        presence
            .moderators()
            .filter(|moderator| *moderator != sender)
            .map(|moderator| HostAction::Notify {
                player: moderator.clone(),
                message: relay.clone(),
            }),
    );
    actions
}

#[cfg(test)]
mod tests {
    use skyarena_protocol::WorldName;

    use super::*;

    fn setup() -> (tempfile::TempDir, ArenaManager, Presence) {
        let tmp = tempfile::tempdir().unwrap();
        let mut arenas = ArenaManager::new(tmp.path().join("arenas"), tmp.path().join("worlds"));
        arenas
            .create("Skyfall")
            .unwrap()
            .bind_world(WorldName::from("sky1"));

        let mut presence = Presence::new();
        presence.join("Lobbyist".into(), "lobby".into(), false);
        presence.join("Fighter".into(), "sky1".into(), false);
        presence.join("Mod".into(), "lobby".into(), true);
        (tmp, arenas, presence)
    }

    #[test]
    fn test_route_chat_lobby_sender_skips_arena_players() {
        let (_tmp, arenas, presence) = setup();
        let everyone = vec!["Lobbyist".into(), "Fighter".into(), "Mod".into()];

        let actions = route_chat(&arenas, &presence, &"Lobbyist".into(), "hi", everyone);

        assert_eq!(
            actions,
            [HostAction::Chat {
                recipients: vec!["Lobbyist".into(), "Mod".into()],
                message: "hi".to_string(),
            }]
        );
    }

    #[test]
    fn test_route_chat_arena_sender_relays_to_moderators() {
        let (_tmp, arenas, presence) = setup();
        let audience = vec!["Fighter".into()];

        let actions = route_chat(&arenas, &presence, &"Fighter".into(), "gg", audience);

        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[1],
            HostAction::Notify {
                player: "Mod".into(),
                message: "Skyfall > gg".to_string(),
            }
        );
    }
}
