use crate::error::{Error, Result};
use crate::Geotag;

pub const DEFAULT_MAP_HOST: &str = "www.bing.com";

/// Web map service that can center a map on a coordinate.
#[derive(Debug, Clone)]
pub struct MapService {
    host: String,
}

impl Default for MapService {
    fn default() -> Self {
        MapService::new(DEFAULT_MAP_HOST)
    }
}

impl MapService {
    pub fn new(host: &str) -> MapService {
        MapService {
            host: host.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, geotag: &Geotag) -> String {
        // Adding 0.0 turns -0.0 into 0.0 so a zero never prints a sign.
        format!(
            "http://{}/maps?&where1={:.8}%20{:.8}",
            self.host,
            geotag.latitude + 0.0,
            geotag.longitude + 0.0
        )
    }
}

/// Hands `url` to the desktop's default handler.
pub fn launch(url: &str) -> Result<()> {
    log::info!("launching {}", url);
    platform_launch(url)
}

#[cfg(windows)]
fn platform_launch(url: &str) -> Result<()> {
    use windows::{
        core::{w, HSTRING},
        Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED},
        Win32::UI::Shell::ShellExecuteW,
        Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL,
    };

    let target = HSTRING::from(url);
    let result = unsafe {
        let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        ShellExecuteW(None, w!("open"), &target, None, None, SW_SHOWNORMAL)
    };
    if result.0 as isize > 32 {
        Ok(())
    } else {
        Err(Error::Launch {
            target: url.to_string(),
            reason: format!("ShellExecute failed with code {}", result.0 as isize),
        })
    }
}

#[cfg(not(windows))]
fn platform_launch(url: &str) -> Result<()> {
    opener::open(url).map_err(|e| Error::Launch {
        target: url.to_string(),
        reason: e.to_string(),
    })
}
