use crate::{fabric::IgnoreReason, plugin::InboundMessage};

/// Decide whether an inbound message may enter the relay at all.
///
/// Messages from automated identities (bots, webhooks, including the relay's
/// own mirrored copies) and platform system messages are rejected. This is the
/// only gate keeping the network from relaying its own output back out, so it
/// runs before any table lookup.
pub fn check_relayable(msg: &InboundMessage) -> Result<(), IgnoreReason> {
    if msg.author_is_automated {
        return Err(IgnoreReason::AutomatedAuthor);
    }
    if msg.is_system_message {
        return Err(IgnoreReason::SystemMessage);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(false, false, Ok(()))]
    #[case(true, false, Err(IgnoreReason::AutomatedAuthor))]
    #[case(false, true, Err(IgnoreReason::SystemMessage))]
    #[case(true, true, Err(IgnoreReason::AutomatedAuthor))]
    fn gate_by_author_kind(
        #[case] automated: bool,
        #[case] system: bool,
        #[case] expected: Result<(), IgnoreReason>,
    ) {
        let msg = InboundMessage {
            author_is_automated: automated,
            is_system_message: system,
            content: "hi".into(),
            ..Default::default()
        };
        assert_eq!(check_relayable(&msg), expected);
    }
}
