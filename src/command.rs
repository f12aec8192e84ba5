//! Module containing the [`Command`] type.

use std::ffi::{CStr, CString, OsStr};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::ptr;

/// Command to execute in one of the stages of the pipeline.
///
/// A command is a program and its arguments, there is no shell-like parsing
/// involved. The program is looked up using the `PATH` environment variable
/// if it doesn't contain a slash, see [`execvp(3)`].
///
/// All memory needed to execute the command is allocated when the command is
/// build. After forking a process is not allowed to allocate (if the parent
/// is multi-threaded), so the child only passes pointers to the OS.
///
/// [`execvp(3)`]: https://pubs.opengroup.org/onlinepubs/9699919799/functions/exec.html
pub struct Command {
    /// Program name, also the first argument.
    program: CString,
    /// Arguments, excluding the program name.
    args: Vec<CString>,
    /// Pointers into `program` and `args`, terminated by a null pointer.
    argv: Vec<*const libc::c_char>,
    /// Set if `program` or one of the `args` contained a NUL byte.
    saw_nul: bool,
}

impl Command {
    /// Create a new command to execute `program`.
    ///
    /// The program is also used as the first argument (`argv[0]`).
    pub fn new<S: AsRef<OsStr>>(program: S) -> Command {
        let mut saw_nul = false;
        let program = os2c(program.as_ref(), &mut saw_nul);
        let argv = vec![program.as_ptr(), ptr::null()];
        Command {
            program,
            args: Vec::new(),
            argv,
            saw_nul,
        }
    }

    /// The directory listing command: `ls -al`.
    pub fn producer() -> Command {
        Command::new("ls").arg("-al")
    }

    /// The numeric sort on the fifth field: `sort -n -k 5`.
    pub fn consumer() -> Command {
        Command::new("sort").args(["-n", "-k", "5"])
    }

    /// Add an argument to pass to the program.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Command {
        let arg = os2c(arg.as_ref(), &mut self.saw_nul);
        // Moving the `CString` into `args` doesn't move its heap allocation,
        // so the pointer stays valid.
        let idx = self.argv.len() - 1;
        self.argv[idx] = arg.as_ptr();
        self.argv.push(ptr::null());
        self.args.push(arg);
        self
    }

    /// Add multiple arguments to pass to the program.
    pub fn args<I, S>(mut self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Returns the program to execute.
    pub fn get_program(&self) -> &OsStr {
        OsStr::from_bytes(self.program.as_bytes())
    }

    /// Returns the arguments passed to the program, excluding the program
    /// itself.
    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> + '_ {
        self.args.iter().map(|arg| OsStr::from_bytes(arg.as_bytes()))
    }

    /// Returns `true` if the program or any of the arguments contained a NUL
    /// byte. Such a command can't be executed.
    pub(crate) const fn saw_nul(&self) -> bool {
        self.saw_nul
    }

    pub(crate) fn program_ptr(&self) -> *const libc::c_char {
        self.program.as_ptr()
    }

    /// Null terminated argument vector, as expected by `execvp(3)`.
    pub(crate) fn argv_ptr(&self) -> *const *const libc::c_char {
        self.argv.as_ptr()
    }
}

/// Converts `s` into a `CString`, replacing it with a placeholder and setting
/// `saw_nul` if it contains a NUL byte.
fn os2c(s: &OsStr, saw_nul: &mut bool) -> CString {
    CString::new(s.as_bytes()).unwrap_or_else(|_| {
        *saw_nul = true;
        CString::from(c"<string-with-nul>")
    })
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("program", &self.get_program())
            .field("args", &self.args.iter().map(CString::as_c_str).collect::<Vec<&CStr>>())
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_program().to_string_lossy())?;
        for arg in self.get_args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
