//! Command invocation surface shared by single clients and clusters
//!
//! `Commands` resolves any command by name (with or without the `Async`
//! suffix). `CommandsExt` adds typed wrappers for common commands on top.

pub mod table;

use futures::future::{self, FutureExt};

pub use table::{lookup, CommandClassifier, CommandSpec, CommandTable, COMMANDS};

use crate::client::{CommandFuture, Invocable};
use crate::utils::CommandError;

/// Call any command by name
pub trait Commands {
    /// Resolve `requested` (e.g. `get` or `getAsync`) into an invocable
    fn command(&self, requested: &str) -> Result<Invocable, CommandError>;

    /// Resolve and invoke in one step
    fn invoke<A: AsRef<[u8]>>(&self, requested: &str, args: &[A]) -> CommandFuture {
        match self.command(requested) {
            Ok(invocable) => invocable.call(args),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }
}

macro_rules! command_wrappers {
    ($($(#[$doc:meta])* fn $method:ident($($arg:ident),*) => $name:literal;)*) => {
        /// Typed wrappers over `Commands::invoke`
        pub trait CommandsExt: Commands {
            $(
                $(#[$doc])*
                fn $method(&self, $($arg: impl AsRef<[u8]>),*) -> CommandFuture {
                    self.invoke::<&[u8]>($name, &[$($arg.as_ref()),*])
                }
            )*

            fn del<A: AsRef<[u8]>>(&self, keys: &[A]) -> CommandFuture {
                self.invoke("del", keys)
            }

            fn mget<A: AsRef<[u8]>>(&self, keys: &[A]) -> CommandFuture {
                self.invoke("mget", keys)
            }

            fn mset<K: AsRef<[u8]>, V: AsRef<[u8]>>(&self, pairs: &[(K, V)]) -> CommandFuture {
                let args: Vec<&[u8]> = pairs
                    .iter()
                    .flat_map(|(k, v)| [k.as_ref(), v.as_ref()])
                    .collect();
                self.invoke("mset", &args)
            }

            fn expire(&self, key: impl AsRef<[u8]>, seconds: i64) -> CommandFuture {
                let seconds = seconds.to_string();
                self.invoke::<&[u8]>("expire", &[key.as_ref(), seconds.as_bytes()])
            }

            fn lrange(&self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> CommandFuture {
                let (start, stop) = (start.to_string(), stop.to_string());
                self.invoke::<&[u8]>("lrange", &[key.as_ref(), start.as_bytes(), stop.as_bytes()])
            }
        }

        impl<T: Commands> CommandsExt for T {}
    };
}

command_wrappers! {
    fn get(key) => "get";
    fn set(key, value) => "set";
    fn exists(key) => "exists";
    fn ttl(key) => "ttl";
    fn incr(key) => "incr";
    fn decr(key) => "decr";
    fn hget(key, field) => "hget";
    fn hset(key, field, value) => "hset";
    fn hgetall(key) => "hgetall";
    fn lpush(key, value) => "lpush";
    fn sadd(key, member) => "sadd";
    fn smembers(key) => "smembers";
    /// Glob-style key listing
    fn keys(pattern) => "keys";
    fn ping() => "ping";
    fn dbsize() => "dbsize";
}
