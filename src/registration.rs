//! Explorer context-menu registration for JPEG files.
//!
//! The entries live under HKEY_LOCAL_MACHINE, so writing them needs an
//! elevated process. A non-elevated caller relaunches the executable through
//! the "runas" verb with `--elevated <action>`, waits for the child and
//! turns a non-zero exit into an error.

use std::{fmt, path::Path};

use crate::error::{Error, Result};

pub const EXTENSIONS: [&str; 2] = [".jpg", ".jpeg"];
pub const VERB_KEY: &str = "MapPhoto";
pub const MENU_TEXT: &str = "Map Photo";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Register,
    Unregister,
}

impl Action {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Unregister => "unregister",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Elevation {
    /// The action ran in this process.
    Done,
    /// An elevated copy of this executable ran the action successfully.
    Relaunched,
    /// The user declined the elevation prompt.
    Refused,
}

/// Registry path of the verb key for `ext`, relative to HKLM.
pub fn verb_key_path(ext: &str) -> String {
    format!(
        "Software\\Classes\\SystemFileAssociations\\{}\\shell\\{}",
        ext, VERB_KEY
    )
}

/// Command line Explorer runs for the verb.
pub fn command_line(exe: &Path) -> String {
    format!("\"{}\" \"%1\"", exe.display())
}

/// Runs `action`, elevating first when this process lacks admin rights.
pub fn run(action: Action) -> Result<Elevation> {
    if platform::is_elevated() {
        perform(action)?;
        return Ok(Elevation::Done);
    }

    log::info!("{} requires elevation, relaunching", action);
    let exe = current_exe()?;
    let params = format!("--elevated {}", action.as_arg());
    let exit_code = platform::relaunch_elevated(&exe, &params)?;
    child_outcome(action, exit_code)
}

/// Interprets the exit code of the elevated child; `None` means the user
/// declined the prompt and no child ran.
fn child_outcome(action: Action, exit_code: Option<u32>) -> Result<Elevation> {
    match exit_code {
        None => {
            log::debug!("elevation declined, {} aborted", action);
            Ok(Elevation::Refused)
        }
        Some(0) => Ok(Elevation::Relaunched),
        Some(code) => Err(Error::ElevatedChild {
            action: action.as_arg(),
            code,
        }),
    }
}

/// Runs `action` directly. Called in the elevated child.
pub fn perform(action: Action) -> Result<()> {
    match action {
        Action::Register => {
            let command = command_line(&current_exe()?);
            for ext in EXTENSIONS {
                let key = verb_key_path(ext);
                log::info!("registering {}", key);
                platform::set_default_value(&key, MENU_TEXT)?;
                platform::set_default_value(&format!("{}\\command", key), &command)?;
            }
        }
        Action::Unregister => {
            for ext in EXTENSIONS {
                let key = verb_key_path(ext);
                log::info!("unregistering {}", key);
                platform::delete_tree(&key)?;
            }
        }
    }
    Ok(())
}

fn current_exe() -> Result<std::path::PathBuf> {
    std::env::current_exe().map_err(|source| Error::Io {
        path: "<current executable>".into(),
        source,
    })
}

#[cfg(windows)]
mod platform {
    use std::path::Path;

    use windows::{
        core::{w, HSTRING, PCWSTR},
        Win32::Foundation::{CloseHandle, ERROR_CANCELLED, ERROR_SUCCESS},
        Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED},
        Win32::System::Registry::{
            RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegSetValueExW, HKEY,
            HKEY_LOCAL_MACHINE, KEY_WRITE, REG_OPTION_NON_VOLATILE, REG_SZ,
        },
        Win32::System::Threading::{GetExitCodeProcess, WaitForSingleObject, INFINITE},
        Win32::UI::Shell::{
            IsUserAnAdmin, ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW,
        },
        Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL,
    };

    use crate::error::{Error, Result};

    pub fn is_elevated() -> bool {
        unsafe { IsUserAnAdmin().as_bool() }
    }

    /// Runs `exe params` elevated and waits for it. Returns its exit code,
    /// or `None` when the user cancels the UAC prompt.
    pub fn relaunch_elevated(exe: &Path, params: &str) -> Result<Option<u32>> {
        let file = HSTRING::from(exe.as_os_str());
        let params = HSTRING::from(params);
        let launch_err = |reason: String| Error::Launch {
            target: exe.display().to_string(),
            reason,
        };

        let mut info = SHELLEXECUTEINFOW {
            cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
            fMask: SEE_MASK_NOCLOSEPROCESS,
            lpVerb: w!("runas"),
            lpFile: PCWSTR(file.as_ptr()),
            lpParameters: PCWSTR(params.as_ptr()),
            nShow: SW_SHOWNORMAL.0,
            ..Default::default()
        };
        let launched = unsafe {
            let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
            ShellExecuteExW(&mut info)
        };
        if let Err(e) = launched {
            if e.code() == ERROR_CANCELLED.to_hresult() {
                return Ok(None);
            }
            return Err(launch_err(format!("ShellExecuteEx failed: {}", e)));
        }
        if info.hProcess.is_invalid() {
            return Err(launch_err("no process handle for elevated child".to_string()));
        }

        let mut exit_code = 0u32;
        let waited = unsafe {
            WaitForSingleObject(info.hProcess, INFINITE);
            GetExitCodeProcess(info.hProcess, &mut exit_code)
        };
        unsafe {
            let _ = CloseHandle(info.hProcess);
        }
        waited.map_err(|e| launch_err(format!("no exit code from elevated child: {}", e)))?;
        log::debug!("elevated child exited with {}", exit_code);
        Ok(Some(exit_code))
    }

    pub fn set_default_value(key: &str, value: &str) -> Result<()> {
        let registry_err = |reason: String| Error::Registry {
            key: key.to_string(),
            reason,
        };
        let mut hkey = HKEY::default();
        unsafe {
            RegCreateKeyExW(
                HKEY_LOCAL_MACHINE,
                &HSTRING::from(key),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_WRITE,
                None,
                &mut hkey,
                None,
            )
        }
        .ok()
        .map_err(|e| registry_err(e.to_string()))?;

        let data: Vec<u8> = value
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        let set = unsafe { RegSetValueExW(hkey, PCWSTR::null(), 0, REG_SZ, Some(&data)) };
        let closed = unsafe { RegCloseKey(hkey) };
        set.ok().map_err(|e| registry_err(e.to_string()))?;
        if closed != ERROR_SUCCESS {
            log::warn!("closing {} failed: {:?}", key, closed);
        }
        Ok(())
    }

    pub fn delete_tree(key: &str) -> Result<()> {
        unsafe { RegDeleteTreeW(HKEY_LOCAL_MACHINE, &HSTRING::from(key)) }
            .ok()
            .map_err(|e| Error::Registry {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(not(windows))]
mod platform {
    use std::path::Path;

    use crate::error::{Error, Result};

    pub fn is_elevated() -> bool {
        false
    }

    pub fn relaunch_elevated(_exe: &Path, _params: &str) -> Result<Option<u32>> {
        Err(Error::Unsupported("context-menu registration"))
    }

    pub fn set_default_value(_key: &str, _value: &str) -> Result<()> {
        Err(Error::Unsupported("context-menu registration"))
    }

    pub fn delete_tree(_key: &str) -> Result<()> {
        Err(Error::Unsupported("context-menu registration"))
    }
}
