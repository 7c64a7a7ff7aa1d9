use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (economy schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA_V1)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    if version < 2 {
        info!("Running migration v2 (catalog seed)");
        let tx = conn.transaction()?;
        tx.execute_batch(SEED_V2)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

const SCHEMA_V1: &str = "
    CREATE TABLE users (
        id              TEXT PRIMARY KEY,
        username        TEXT NOT NULL UNIQUE,
        password        TEXT NOT NULL,
        xp              INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
        level           INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
        streak          INTEGER NOT NULL DEFAULT 0 CHECK (streak >= 0),
        longest_streak  INTEGER NOT NULL DEFAULT 0 CHECK (longest_streak >= 0),
        last_active     TEXT,
        coins           INTEGER NOT NULL DEFAULT 0 CHECK (coins >= 0),
        created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    );

    CREATE INDEX idx_users_xp ON users(xp DESC, created_at);

    CREATE TABLE xp_events (
        id          TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        amount      INTEGER NOT NULL CHECK (amount > 0),
        reason      TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );

    CREATE INDEX idx_xp_events_user ON xp_events(user_id, created_at);

    CREATE TABLE coin_transactions (
        id          TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        amount      INTEGER NOT NULL CHECK (amount <> 0),
        kind        TEXT NOT NULL CHECK (kind IN ('earned', 'spent', 'bonus', 'refund')),
        description TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );

    CREATE INDEX idx_coin_transactions_user ON coin_transactions(user_id, created_at);

    CREATE TABLE badges (
        id          TEXT PRIMARY KEY,
        slug        TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        description TEXT NOT NULL,
        criterion   TEXT NOT NULL CHECK (criterion IN ('xp', 'level', 'streak', 'quests', 'purchases', 'coins', 'manual')),
        threshold   INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE user_badges (
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        badge_id    TEXT NOT NULL REFERENCES badges(id),
        earned_at   TEXT NOT NULL,
        PRIMARY KEY (user_id, badge_id)
    );

    CREATE TABLE quests (
        id          TEXT PRIMARY KEY,
        slug        TEXT NOT NULL UNIQUE,
        title       TEXT NOT NULL,
        description TEXT NOT NULL,
        period      TEXT NOT NULL CHECK (period IN ('daily', 'weekly', 'special')),
        action      TEXT NOT NULL,
        target      INTEGER NOT NULL CHECK (target > 0),
        xp_reward   INTEGER NOT NULL DEFAULT 0 CHECK (xp_reward >= 0),
        coin_reward INTEGER NOT NULL DEFAULT 0 CHECK (coin_reward >= 0),
        active      INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE user_quests (
        id           TEXT PRIMARY KEY,
        user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        quest_id     TEXT NOT NULL REFERENCES quests(id),
        period_key   TEXT NOT NULL,
        progress     INTEGER NOT NULL DEFAULT 0 CHECK (progress >= 0),
        assigned_at  TEXT NOT NULL,
        expires_at   TEXT,
        completed_at TEXT,
        UNIQUE (user_id, quest_id, period_key)
    );

    CREATE INDEX idx_user_quests_open ON user_quests(user_id, completed_at, expires_at);

    CREATE TABLE rewards (
        id          TEXT PRIMARY KEY,
        slug        TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        description TEXT NOT NULL,
        price       INTEGER NOT NULL CHECK (price >= 0),
        stock       INTEGER CHECK (stock IS NULL OR stock >= 0),
        active      INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE user_rewards (
        id           TEXT PRIMARY KEY,
        user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        reward_id    TEXT NOT NULL REFERENCES rewards(id),
        coins_paid   INTEGER NOT NULL CHECK (coins_paid >= 0),
        purchased_at TEXT NOT NULL,
        used         INTEGER NOT NULL DEFAULT 0,
        used_at      TEXT
    );

    CREATE INDEX idx_user_rewards_user ON user_rewards(user_id, purchased_at);

    CREATE TABLE streak_bonuses (
        id          TEXT PRIMARY KEY,
        days        INTEGER NOT NULL UNIQUE CHECK (days > 0),
        coins       INTEGER NOT NULL DEFAULT 0 CHECK (coins >= 0),
        xp          INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
        badge_slug  TEXT REFERENCES badges(slug)
    );

    CREATE TABLE user_streak_bonuses (
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        bonus_id    TEXT NOT NULL REFERENCES streak_bonuses(id),
        granted_at  TEXT NOT NULL,
        PRIMARY KEY (user_id, bonus_id)
    );
";

const SEED_V2: &str = "
    INSERT INTO badges (id, slug, name, description, criterion, threshold) VALUES
        ('00000000-0000-0000-0003-000000000001', 'first-steps',   'First Steps',   'Earn your first 100 XP',              'xp',        100),
        ('00000000-0000-0000-0003-000000000002', 'dedicated',     'Dedicated',     'Earn 1,000 XP',                       'xp',        1000),
        ('00000000-0000-0000-0003-000000000003', 'rising-star',   'Rising Star',   'Reach level 5',                       'level',     5),
        ('00000000-0000-0000-0003-000000000004', 'trailblazer',   'Trailblazer',   'Reach level 10',                      'level',     10),
        ('00000000-0000-0000-0003-000000000005', 'on-fire',       'On Fire',       'Keep a 5 day streak',                 'streak',    5),
        ('00000000-0000-0000-0003-000000000006', 'quest-rookie',  'Quest Rookie',  'Complete your first quest',           'quests',    1),
        ('00000000-0000-0000-0003-000000000007', 'quest-master',  'Quest Master',  'Complete 25 quests',                  'quests',    25),
        ('00000000-0000-0000-0003-000000000008', 'first-purchase','Treat Yourself','Buy something in the reward shop',    'purchases', 1),
        ('00000000-0000-0000-0003-000000000009', 'big-spender',   'Big Spender',   'Make 10 reward shop purchases',       'purchases', 10),
        ('00000000-0000-0000-0003-000000000010', 'week-warrior',  'Week Warrior',  'Reach a 7 day streak',                'manual',    0),
        ('00000000-0000-0000-0003-000000000011', 'month-master',  'Month Master',  'Reach a 30 day streak',               'manual',    0),
        ('00000000-0000-0000-0003-000000000012', 'centurion',     'Centurion',     'Reach a 100 day streak',              'manual',    0),
        ('00000000-0000-0000-0003-000000000013', 'coin-collector','Coin Collector','Earn 500 coins',                      'coins',     500);

    INSERT INTO streak_bonuses (id, days, coins, xp, badge_slug) VALUES
        ('00000000-0000-0000-0004-000000000001', 3,   10,  25,   NULL),
        ('00000000-0000-0000-0004-000000000002', 7,   25,  50,   'week-warrior'),
        ('00000000-0000-0000-0004-000000000003', 14,  50,  100,  NULL),
        ('00000000-0000-0000-0004-000000000004', 30,  100, 250,  'month-master'),
        ('00000000-0000-0000-0004-000000000005', 60,  200, 500,  NULL),
        ('00000000-0000-0000-0004-000000000006', 100, 500, 1000, 'centurion');

    INSERT INTO quests (id, slug, title, description, period, action, target, xp_reward, coin_reward) VALUES
        ('00000000-0000-0000-0001-000000000001', 'daily-weigh-in',   'Daily Weigh-in',   'Log your weight today',              'daily',   'log_weight',   1,  20,  5),
        ('00000000-0000-0000-0001-000000000002', 'daily-meals',      'Three Square Meals','Log three meals today',             'daily',   'log_meal',     3,  15,  5),
        ('00000000-0000-0000-0001-000000000003', 'daily-mood',       'Mood Check',       'Record how you feel today',          'daily',   'log_mood',     1,  10,  2),
        ('00000000-0000-0000-0001-000000000004', 'weekly-weigh-ins', 'Steady Scale',     'Log your weight five times this week','weekly', 'log_weight',   5,  75,  25),
        ('00000000-0000-0000-0001-000000000005', 'weekly-community', 'Community Voice',  'Leave ten comments this week',       'weekly',  'post_comment', 10, 60,  20),
        ('00000000-0000-0000-0001-000000000006', 'first-plan',       'Share Your Plan',  'Publish your first plan',            'special', 'publish_plan', 1,  100, 50),
        ('00000000-0000-0000-0001-000000000007', 'join-a-group',     'Better Together',  'Join a group',                       'special', 'join_group',   1,  50,  20);

    INSERT INTO rewards (id, slug, name, description, price, stock, active) VALUES
        ('00000000-0000-0000-0002-000000000001', 'streak-freeze',  'Streak Freeze',   'Protect your streak for one missed day', 50,  NULL, 1),
        ('00000000-0000-0000-0002-000000000002', 'custom-title',   'Custom Title',    'Pick a title shown next to your name',   150, NULL, 1),
        ('00000000-0000-0000-0002-000000000003', 'gold-frame',     'Gold Frame',      'A gold frame for your profile picture',  200, 100,  1),
        ('00000000-0000-0000-0002-000000000004', 'double-xp-day',  'Double XP Day',   'Earn double XP for a day',               300, 25,   1),
        ('00000000-0000-0000-0002-000000000005', 'legacy-avatar',  'Legacy Avatar',   'Retired launch avatar',                  100, 10,   0);
";
