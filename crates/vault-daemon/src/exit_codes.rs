/// Process exit codes for fatal startup failures. `0` (clean shutdown) is
/// the process default and has no named constant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    MissingKey,
    SocketBind,
    PermissionVerify,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            Self::MissingKey => 1,
            Self::SocketBind => 2,
            Self::PermissionVerify => 3,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::MissingKey => "missing_key",
            Self::SocketBind => "socket_bind",
            Self::PermissionVerify => "permission_verify",
        }
    }
}
