use crate::config::NoticeConfig;
use std::process::Command;
use std::sync::Mutex;

/// Low-urgency desktop notification kept up while the pill is running.
pub struct StatusNotice {
    title: String,
    current_notification_id: Mutex<Option<u32>>,
}

impl StatusNotice {
    pub fn new(config: &NoticeConfig) -> Self {
        Self {
            title: config.title.clone(),
            current_notification_id: Mutex::new(None),
        }
    }

    pub fn post(&self) {
        let mut cmd = Command::new("notify-send");
        cmd.arg("--app-name=island")
            .arg("--urgency=low")
            .arg("--expire-time=0")
            .arg("--print-id")
            .arg(&self.title);

        if let Ok(id_guard) = self.current_notification_id.lock() {
            if let Some(id) = *id_guard {
                cmd.arg(format!("--replace-id={}", id));
            }
        }

        match cmd.output() {
            Ok(output) => {
                let id = String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok());
                if let (Some(id), Ok(mut id_guard)) = (id, self.current_notification_id.lock()) {
                    *id_guard = Some(id);
                }
            }
            Err(e) => tracing::debug!("Status notice not posted: {}", e),
        }
    }

    pub fn close(&self) {
        let id = match self.current_notification_id.lock() {
            Ok(mut id_guard) => id_guard.take(),
            Err(_) => None,
        };

        if let Some(id) = id {
            // notify-send cannot close by id; an immediately expiring replacement does the job.
            let _ = Command::new("notify-send")
                .arg("--app-name=island")
                .arg(format!("--replace-id={}", id))
                .arg("--expire-time=1")
                .arg(&self.title)
                .output();
        }
    }
}
