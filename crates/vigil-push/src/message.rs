/// Extract the target device from a kill-switch message.
///
/// Targeted forms:
///   block:<device>:<reason>
///   IMMEDIATE_QUARANTINE:<device>
///   CRITICAL_LOCK:<device>
///
/// Anything else is untargeted and reaches every socket.
pub fn target_device(message: &str) -> Option<&str> {
    let mut parts = message.splitn(3, ':');
    let prefix = parts.next()?;
    match prefix {
        "block" | "IMMEDIATE_QUARANTINE" | "CRITICAL_LOCK" => {
            parts.next().filter(|device| !device.is_empty())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_messages_are_targeted() {
        assert_eq!(target_device("block:d1:logout"), Some("d1"));
        assert_eq!(target_device("block:d1:score:34"), Some("d1"));
        assert_eq!(target_device("block:"), None);
    }

    #[test]
    fn quarantine_and_lock_are_targeted() {
        assert_eq!(target_device("IMMEDIATE_QUARANTINE:d9"), Some("d9"));
        assert_eq!(target_device("CRITICAL_LOCK:d2"), Some("d2"));
    }

    #[test]
    fn other_messages_are_untargeted() {
        assert_eq!(target_device("force_overlay:d1"), None);
        assert_eq!(target_device("maintenance"), None);
        assert_eq!(target_device(""), None);
    }
}
