pub const METRIC_STREAM_LENGTH: &str = "redis_stream_length";
pub const METRIC_STREAM_GROUPS: &str = "redis_stream_consumers_total";
pub const METRIC_GROUP_PENDING_MESSAGES: &str =
    "redis_stream_consumer_group_pending_messages_total";
pub const METRIC_GROUP_CONSUMERS: &str = "redis_stream_consumer_group_consumers_total";
pub const METRIC_CONSUMER_IDLE_SECONDS: &str = "redis_stream_consumer_idle_time_seconds_total";

pub const METRIC_SCRAPE_DURATION_SECONDS: &str = "redis_stream_exporter_scrape_duration_seconds";
pub const METRIC_UP: &str = "redis_stream_exporter_up";
pub const METRIC_LAST_UPDATE_TIMESTAMP: &str =
    "redis_stream_exporter_last_update_timestamp_seconds";

pub const LABEL_STREAM: &str = "stream";
pub const LABEL_REDIS_SERVER: &str = "redis_server";
pub const LABEL_GROUP: &str = "group";
pub const LABEL_CONSUMER: &str = "consumer";

pub const HELP_STREAM_LENGTH: &str = "Length of Redis Stream";
pub const HELP_STREAM_GROUPS: &str = "Total number of consumer groups for Redis Stream";
pub const HELP_GROUP_PENDING_MESSAGES: &str =
    "Total number of pending messages in Redis Stream consumer group";
pub const HELP_GROUP_CONSUMERS: &str = "Total number of consumers in Redis Stream consumer group";
pub const HELP_CONSUMER_IDLE_SECONDS: &str =
    "Idle time of each consumer in Redis Stream consumer group";
pub const HELP_SCRAPE_DURATION_SECONDS: &str = "Duration of the last collection cycle in seconds";
pub const HELP_UP: &str = "1 if the last collection cycle reached at least one server, 0 otherwise";
pub const HELP_LAST_UPDATE_TIMESTAMP: &str =
    "Unix timestamp of the last successful collection per server";
