//! A [`SyncChannel`] with nobody on the other end.
//!
//! Used when the tracker runs offline: publishing goes nowhere and
//! nothing ever arrives, so the session's join deadline passes and the
//! participant becomes the room's authority.

use std::future;

use summsync_protocol::{Envelope, ParticipantId, RoomId, SyncMessage};

use crate::{ChannelError, SyncChannel};

#[derive(Debug, Default)]
pub struct SoloChannel {
    room_id: Option<RoomId>,
}

impl SoloChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncChannel for SoloChannel {
    async fn join(
        &mut self,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Result<(), ChannelError> {
        tracing::debug!(room_id = %room_id, %participant, "solo room joined");
        self.room_id = Some(room_id.clone());
        Ok(())
    }

    async fn publish(&mut self, _message: SyncMessage) -> Result<(), ChannelError> {
        match self.room_id {
            Some(_) => Ok(()),
            None => Err(ChannelError::NotJoined),
        }
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        if self.room_id.is_none() {
            return Err(ChannelError::NotJoined);
        }
        future::pending().await
    }

    async fn leave(&mut self) -> Result<(), ChannelError> {
        self.room_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_solo_channel_never_delivers() {
        let mut ch = SoloChannel::new();
        let room = RoomId::new("1");
        ch.join(&room, &ParticipantId::new("me")).await.unwrap();
        ch.publish(SyncMessage::RequestState { room_id: room }).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(60), ch.recv()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn test_solo_channel_requires_join() {
        let mut ch = SoloChannel::new();
        let err = ch
            .publish(SyncMessage::RequestState { room_id: RoomId::new("1") })
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotJoined));
    }
}
