use tokio::sync::oneshot;

use super::ActionResponse;

/// Lets an extended connector reply before its work is finished.
/// Only the first reply is delivered.
#[derive(Debug)]
pub struct Responder {
    tx: Option<oneshot::Sender<ActionResponse>>,
}

impl Responder {
    pub fn channel() -> (Self, oneshot::Receiver<ActionResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A responder nobody listens to, for in-process execution.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn reply(&mut self, response: ActionResponse) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    pub fn has_replied(&self) -> bool {
        self.tx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_first_reply_is_delivered() {
        let (mut responder, rx) = Responder::channel();
        assert!(responder.reply(ActionResponse::ok_with_message("early")));
        assert!(!responder.reply(ActionResponse::failure("late")));
        assert_eq!(rx.await.unwrap().message.as_deref(), Some("early"));
    }

    #[test]
    fn detached_never_delivers() {
        let mut responder = Responder::detached();
        assert!(!responder.reply(ActionResponse::ok()));
    }
}
