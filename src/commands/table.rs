//! Static command table and read-only classification

/// One entry of the command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Never mutates store state; eligible for replica routing
    pub read_only: bool,
}

const fn ro(name: &'static str) -> CommandSpec {
    CommandSpec {
        name,
        read_only: true,
    }
}

const fn rw(name: &'static str) -> CommandSpec {
    CommandSpec {
        name,
        read_only: false,
    }
}

/// Known commands, sorted by name
pub static COMMANDS: &[CommandSpec] = &[
    rw("append"),
    rw("auth"),
    rw("bgrewriteaof"),
    rw("bgsave"),
    ro("bitcount"),
    rw("bitfield"),
    ro("bitfield_ro"),
    rw("bitop"),
    ro("bitpos"),
    rw("blmove"),
    rw("blpop"),
    rw("brpop"),
    rw("brpoplpush"),
    rw("bzpopmax"),
    rw("bzpopmin"),
    rw("client"),
    rw("cluster"),
    rw("command"),
    rw("config"),
    rw("copy"),
    ro("dbsize"),
    rw("decr"),
    rw("decrby"),
    rw("del"),
    rw("discard"),
    ro("dump"),
    rw("echo"),
    rw("eval"),
    ro("eval_ro"),
    rw("evalsha"),
    ro("evalsha_ro"),
    rw("exec"),
    ro("exists"),
    rw("expire"),
    rw("expireat"),
    ro("expiretime"),
    rw("flushall"),
    rw("flushdb"),
    rw("geoadd"),
    ro("geodist"),
    ro("geohash"),
    ro("geopos"),
    rw("georadius"),
    ro("georadius_ro"),
    rw("georadiusbymember"),
    ro("georadiusbymember_ro"),
    ro("geosearch"),
    rw("geosearchstore"),
    ro("get"),
    ro("getbit"),
    rw("getdel"),
    rw("getex"),
    ro("getrange"),
    rw("getset"),
    rw("hdel"),
    ro("hexists"),
    ro("hget"),
    ro("hgetall"),
    rw("hincrby"),
    rw("hincrbyfloat"),
    ro("hkeys"),
    ro("hlen"),
    ro("hmget"),
    rw("hmset"),
    ro("hrandfield"),
    ro("hscan"),
    rw("hset"),
    rw("hsetnx"),
    ro("hstrlen"),
    ro("hvals"),
    rw("incr"),
    rw("incrby"),
    rw("incrbyfloat"),
    rw("info"),
    ro("keys"),
    ro("lastsave"),
    ro("lcs"),
    ro("lindex"),
    rw("linsert"),
    ro("llen"),
    rw("lmove"),
    rw("lpop"),
    ro("lpos"),
    rw("lpush"),
    rw("lpushx"),
    ro("lrange"),
    rw("lrem"),
    rw("lset"),
    rw("ltrim"),
    rw("memory"),
    ro("mget"),
    rw("migrate"),
    rw("move"),
    rw("mset"),
    rw("msetnx"),
    rw("multi"),
    ro("object"),
    rw("persist"),
    rw("pexpire"),
    rw("pexpireat"),
    ro("pexpiretime"),
    rw("pfadd"),
    ro("pfcount"),
    rw("pfmerge"),
    rw("ping"),
    rw("psetex"),
    rw("psubscribe"),
    ro("pttl"),
    rw("publish"),
    rw("punsubscribe"),
    rw("quit"),
    ro("randomkey"),
    rw("rename"),
    rw("renamenx"),
    rw("restore"),
    rw("rpop"),
    rw("rpoplpush"),
    rw("rpush"),
    rw("rpushx"),
    rw("sadd"),
    rw("save"),
    ro("scan"),
    ro("scard"),
    rw("script"),
    ro("sdiff"),
    rw("sdiffstore"),
    rw("select"),
    rw("set"),
    rw("setbit"),
    rw("setex"),
    rw("setnx"),
    rw("setrange"),
    ro("sinter"),
    ro("sintercard"),
    rw("sinterstore"),
    ro("sismember"),
    ro("smembers"),
    ro("smismember"),
    rw("smove"),
    rw("sort"),
    ro("sort_ro"),
    rw("spop"),
    ro("srandmember"),
    rw("srem"),
    ro("sscan"),
    ro("strlen"),
    rw("subscribe"),
    ro("substr"),
    ro("sunion"),
    rw("sunionstore"),
    rw("swapdb"),
    rw("time"),
    ro("touch"),
    ro("ttl"),
    ro("type"),
    rw("unlink"),
    rw("unsubscribe"),
    rw("unwatch"),
    rw("wait"),
    rw("watch"),
    rw("xack"),
    rw("xadd"),
    rw("xautoclaim"),
    rw("xclaim"),
    rw("xdel"),
    rw("xgroup"),
    rw("xinfo"),
    ro("xlen"),
    ro("xpending"),
    ro("xrange"),
    ro("xread"),
    rw("xreadgroup"),
    ro("xrevrange"),
    rw("xtrim"),
    rw("zadd"),
    ro("zcard"),
    ro("zcount"),
    ro("zdiff"),
    rw("zdiffstore"),
    rw("zincrby"),
    ro("zinter"),
    rw("zinterstore"),
    ro("zlexcount"),
    ro("zmscore"),
    rw("zpopmax"),
    rw("zpopmin"),
    ro("zrandmember"),
    ro("zrange"),
    ro("zrangebylex"),
    ro("zrangebyscore"),
    rw("zrangestore"),
    ro("zrank"),
    rw("zrem"),
    rw("zremrangebylex"),
    rw("zremrangebyrank"),
    rw("zremrangebyscore"),
    ro("zrevrange"),
    ro("zrevrangebylex"),
    ro("zrevrangebyscore"),
    ro("zrevrank"),
    ro("zscan"),
    ro("zscore"),
    ro("zunion"),
    rw("zunionstore"),
];

/// Look up a command by name, case-insensitively
pub fn lookup(command: &str) -> Option<&'static CommandSpec> {
    let name = command.to_ascii_lowercase();
    COMMANDS
        .binary_search_by(|spec| spec.name.cmp(name.as_str()))
        .ok()
        .map(|idx| &COMMANDS[idx])
}

/// Decides whether a command may be served by a replica
///
/// Consulted on every routed invocation; implementations should be cheap.
pub trait CommandClassifier: Send + Sync {
    fn is_read_only(&self, command: &str) -> bool;
}

/// Classifier backed by the static command table
///
/// Unknown commands are treated as writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTable;

impl CommandClassifier for CommandTable {
    fn is_read_only(&self, command: &str) -> bool {
        lookup(command).map_or(false, |spec| spec.read_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_and_unique() {
        for pair in COMMANDS.windows(2) {
            assert!(
                pair[0].name < pair[1].name,
                "{} must sort before {}",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn test_classification() {
        let table = CommandTable;
        for cmd in ["get", "mget", "hgetall", "ttl", "exists", "lrange", "smembers", "GET"] {
            assert!(table.is_read_only(cmd), "{} should be read-only", cmd);
        }
        for cmd in ["set", "del", "expire", "incr", "hset", "lpush", "ping", "flushdb"] {
            assert!(!table.is_read_only(cmd), "{} should not be read-only", cmd);
        }
    }

    #[test]
    fn test_unknown_commands_are_writes() {
        assert!(lookup("frobnicate").is_none());
        assert!(!CommandTable.is_read_only("frobnicate"));
        assert!(!CommandTable.is_read_only(""));
    }
}
