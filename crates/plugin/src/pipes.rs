//! Win32 named pipes and process discovery for the handoff

use std::ffi::OsString;
use std::io;
use std::os::windows::ffi::OsStringExt;

use windows::core::{Error, HRESULT, HSTRING};
use windows::Win32::Foundation::{
    CloseHandle, ERROR_BROKEN_PIPE, ERROR_NO_DATA, ERROR_PIPE_CONNECTED, ERROR_PIPE_LISTENING,
    ERROR_PIPE_NOT_CONNECTED, HANDLE,
};
use windows::Win32::Storage::FileSystem::{
    ReadFile, WriteFile, FILE_FLAGS_AND_ATTRIBUTES, PIPE_ACCESS_INBOUND, PIPE_ACCESS_OUTBOUND,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, PeekNamedPipe, PIPE_NOWAIT, PIPE_READMODE_BYTE,
    PIPE_TYPE_BYTE,
};

use dxpipe_core::{HandoffTransport, PipeDirection, PipeEndpoint};
use dxpipe_sdk::wire::PIPE_NAMESPACE;

/// Closes on drop
struct Handle(HANDLE);

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            tracing::debug!("CloseHandle failed: {}", e);
        }
    }
}

/// Server end of a single-instance, non-blocking byte pipe
pub struct Win32Pipe {
    handle: Handle,
    name: String,
    connected: bool,
}

// SAFETY: a pipe handle may be used from any thread.
unsafe impl Send for Win32Pipe {}

impl Win32Pipe {
    pub fn create(name: &str, direction: PipeDirection, buffer_size: u32) -> io::Result<Self> {
        let path = HSTRING::from(format!("{PIPE_NAMESPACE}{name}"));
        let (access, out_size, in_size): (FILE_FLAGS_AND_ATTRIBUTES, u32, u32) = match direction {
            PipeDirection::Outbound => (PIPE_ACCESS_OUTBOUND, buffer_size, 0),
            PipeDirection::Inbound => (PIPE_ACCESS_INBOUND, 0, buffer_size),
        };

        let handle = unsafe {
            CreateNamedPipeW(
                &path,
                access,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_NOWAIT,
                1,
                out_size,
                in_size,
                0,
                None,
            )
        };
        // CreateNamedPipeW reports failure through an invalid handle
        if handle.is_invalid() {
            return Err(to_io(Error::from_win32()));
        }

        tracing::debug!(pipe = name, ?direction, "Pipe created");
        Ok(Self {
            handle: Handle(handle),
            name: name.to_string(),
            connected: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking connect; `NotConnected` while no client is there
    fn connect(&mut self) -> io::Result<()> {
        if self.connected {
            return Ok(());
        }
        match unsafe { ConnectNamedPipe(self.handle.0, None) } {
            Ok(()) => {}
            Err(e) if e.code() == ERROR_PIPE_CONNECTED.to_hresult() => {}
            Err(e) => return Err(to_io(e)),
        }
        tracing::debug!(pipe = %self.name, "Client connected");
        self.connected = true;
        Ok(())
    }
}

impl PipeEndpoint for Win32Pipe {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.connect()?;
        let mut written = 0u32;
        unsafe { WriteFile(self.handle.0, Some(bytes), Some(&mut written), None) }
            .map_err(to_io)?;
        Ok(written as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connect()?;

        // A non-blocking ReadFile on an empty pipe fails with the same code as
        // a closing one, so peek first
        let mut available = 0u32;
        unsafe { PeekNamedPipe(self.handle.0, None, 0, None, Some(&mut available), None) }
            .map_err(to_io)?;
        if available == 0 {
            return Ok(0);
        }

        let mut read = 0u32;
        unsafe { ReadFile(self.handle.0, Some(buf), Some(&mut read), None) }.map_err(to_io)?;
        Ok(read as usize)
    }
}

/// Named pipes plus a Toolhelp scan for the consumer
#[derive(Debug, Default)]
pub struct Win32Transport;

impl HandoffTransport for Win32Transport {
    type Pipe = Win32Pipe;

    fn create_pipe(
        &mut self,
        name: &str,
        direction: PipeDirection,
        buffer_size: u32,
    ) -> io::Result<Win32Pipe> {
        Win32Pipe::create(name, direction, buffer_size)
    }

    fn consumer_running(&mut self, executable: &str) -> bool {
        match process_running(executable) {
            Ok(running) => running,
            Err(e) => {
                tracing::warn!("Process snapshot failed: {}", e);
                false
            }
        }
    }
}

/// Whether any process has this executable name, ignoring case
pub fn process_running(executable: &str) -> windows::core::Result<bool> {
    let snapshot = Handle(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)? });

    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };
    let mut more = unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_ok();
    while more {
        if exe_name(&entry.szExeFile).eq_ignore_ascii_case(executable) {
            return Ok(true);
        }
        more = unsafe { Process32NextW(snapshot.0, &mut entry) }.is_ok();
    }
    Ok(false)
}

fn exe_name(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    OsString::from_wide(&wide[..len])
        .to_string_lossy()
        .into_owned()
}

fn error_kind(code: HRESULT) -> io::ErrorKind {
    if code == ERROR_PIPE_LISTENING.to_hresult() {
        io::ErrorKind::NotConnected
    } else if code == ERROR_NO_DATA.to_hresult()
        || code == ERROR_BROKEN_PIPE.to_hresult()
        || code == ERROR_PIPE_NOT_CONNECTED.to_hresult()
    {
        io::ErrorKind::BrokenPipe
    } else {
        io::ErrorKind::Other
    }
}

fn to_io(error: Error) -> io::Error {
    io::Error::new(error_kind(error.code()), error)
}
