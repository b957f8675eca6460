//! Command dispatch across calling conventions
//!
//! Engines expose commands in one of three ways. The dispatcher turns a
//! requested name (`get` or `getAsync`) into an `Invocable` bound to a
//! handle, picking the method name or raw-call form the engine expects.

use futures::future::{BoxFuture, FutureExt};
use redis::Value;

use crate::engine::ClientHandle;
use crate::utils::{CommandError, Diagnostics};

/// Suffix naming the deferred-result variant of a command
pub const ASYNC_SUFFIX: &str = "Async";

/// Future returned by command invocations
pub type CommandFuture = BoxFuture<'static, Result<Value, CommandError>>;

/// Strip a trailing `Async` from a requested command name
///
/// A bare `Async` is left untouched.
pub fn strip_async_suffix(requested: &str) -> &str {
    match requested.strip_suffix(ASYNC_SUFFIX) {
        Some(command) if !command.is_empty() => command,
        _ => requested,
    }
}

/// How an engine's handles expose commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// The command name itself is a method on the client
    Direct,
    /// `<command>Async` is the native deferred-result variant
    Suffixed,
    /// Every command goes through a single raw-call entry point
    RawDispatch,
}

/// What an invocable calls on its handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    /// Per-command method, by the name the handle is asked for
    Method(String),
    /// Raw call with this command as `argv[0]`
    Raw(String),
}

impl CallingConvention {
    /// Resolve a requested command name into an invocable bound to `handle`
    pub fn resolve(
        &self,
        handle: &ClientHandle,
        requested: &str,
        diagnostics: &Diagnostics,
    ) -> Invocable {
        let command = strip_async_suffix(requested);
        let target = match self {
            CallingConvention::RawDispatch => InvocationTarget::Raw(command.to_string()),
            // Keep the suffix: callers asked for the deferred variant
            CallingConvention::Suffixed => InvocationTarget::Method(requested.to_string()),
            CallingConvention::Direct => InvocationTarget::Method(command.to_string()),
        };

        diagnostics.info(format_args!("{} [{}]", handle.engine(), command));

        Invocable {
            handle: handle.clone(),
            command: command.to_string(),
            target,
            diagnostics: diagnostics.clone(),
        }
    }
}

/// A command bound to one client handle, ready to be called with arguments
#[derive(Debug, Clone)]
pub struct Invocable {
    handle: ClientHandle,
    command: String,
    target: InvocationTarget,
    diagnostics: Diagnostics,
}

impl Invocable {
    /// Command name with any async suffix removed
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn target(&self) -> &InvocationTarget {
        &self.target
    }

    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    /// Invoke the command with the given arguments
    ///
    /// Errors from the underlying client are returned unmodified.
    pub fn call<A: AsRef<[u8]>>(&self, args: &[A]) -> CommandFuture {
        let args: Vec<Vec<u8>> = args.iter().map(|a| a.as_ref().to_vec()).collect();
        self.call_owned(args)
    }

    pub fn call_owned(&self, args: Vec<Vec<u8>>) -> CommandFuture {
        let handle = self.handle.clone();
        match self.target {
            InvocationTarget::Method(ref method) => {
                let method = method.clone();
                async move { handle.call_method(&method, args).await }.boxed()
            }
            InvocationTarget::Raw(ref command) => {
                let mut argv = Vec::with_capacity(args.len() + 1);
                argv.push(command.as_bytes().to_vec());
                argv.extend(args);

                if self.diagnostics.is_enabled() {
                    let shown: Vec<String> = argv
                        .iter()
                        .map(|a| String::from_utf8_lossy(a).into_owned())
                        .collect();
                    self.diagnostics.info(format_args!(
                        "Performing raw call with {}: {:?}",
                        handle.engine(),
                        shown
                    ));
                }

                async move { handle.raw_call(argv).await }.boxed()
            }
        }
    }
}
