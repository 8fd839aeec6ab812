//! Reboot through the platform `shutdown` command.

use std::sync::Arc;

use super::{CommandRunner, HostError, RebootRequest, Rebooter};

/// Which `shutdown` dialect to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootPlatform {
  Windows,
  Unix,
}

impl RebootPlatform {
  pub fn native() -> Self {
    if cfg!(windows) {
      RebootPlatform::Windows
    } else {
      RebootPlatform::Unix
    }
  }
}

/// Requests a restart via `shutdown.exe /r` (Windows) or `shutdown -r` (Unix).
pub struct ShutdownRebooter {
  platform: RebootPlatform,
  runner: Arc<dyn CommandRunner>,
}

impl ShutdownRebooter {
  pub fn new(platform: RebootPlatform, runner: Arc<dyn CommandRunner>) -> Self {
    Self { platform, runner }
  }

  pub(crate) fn invocation(&self, request: &RebootRequest) -> (&'static str, Vec<String>) {
    match self.platform {
      RebootPlatform::Windows => (
        "shutdown.exe",
        vec![
          "/r".to_string(),
          "/t".to_string(),
          request.delay_secs.to_string(),
          "/c".to_string(),
          request.reason.clone(),
        ],
      ),
      RebootPlatform::Unix => {
        // Unix shutdown schedules in whole minutes.
        let when = match request.delay_secs {
          0 => "now".to_string(),
          secs => format!("+{}", secs.div_ceil(60)),
        };
        ("shutdown", vec!["-r".to_string(), when, request.reason.clone()])
      }
    }
  }
}

impl Rebooter for ShutdownRebooter {
  fn reboot(&self, request: &RebootRequest) -> Result<(), HostError> {
    let (program, args) = self.invocation(request);
    self.runner.run(program, &args)
  }
}
