#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Header fields every submitted source file must fill in, in the order they
/// are reported when missing.
/// * `氏名`: full name
/// * `学生番号`: student number
/// * `作成日`: creation date
/// * `入出力の説明`: description of input and output
/// * `動きの説明`: description of the program's behaviour
/// * `感想`: reflection
pub const REQUIRED_HEADER_FIELDS: [&str; 6] =
    ["氏名", "学生番号", "作成日", "入出力の説明", "動きの説明", "感想"];

/// Default roster column holding the student identifier.
pub const DEFAULT_ID_COLUMN: &str = "広大ID";

/// Default roster column holding the student's display name.
pub const DEFAULT_NAME_COLUMN: &str = "フルネーム";

/// Default roster column holding the submission status text.
pub const DEFAULT_STATUS_COLUMN: &str = "ステータス";

/// Default roster column holding the instructor's feedback comment.
pub const DEFAULT_FEEDBACK_COLUMN: &str = "フィードバックコメント";

/// Key under which serialized records carry the review flag, `"1"` or `""`.
pub const REVIEWED_KEY: &str = "レビュー済み";

/// Marker contained in the status text of submitted rows.
pub const DEFAULT_SUBMITTED_MARKER: &str = "提出済み";

/// File name of the feedback-augmented roster copy.
pub const FEEDBACK_CSV_FILE: &str = "list_feedback.csv";

/// File name of the review-status table.
pub const REVIEW_STATUS_FILE: &str = "review_status.json";

/// File name of the auto-check result set.
pub const AUTO_CHECK_FILE: &str = "auto_check_results.json";

/// File name of the manifest written for imported assignments.
pub const MANIFEST_FILE: &str = "assignment.json";

/// Roster file name used for imported assignments.
pub const IMPORTED_ROSTER_FILE: &str = "roster.csv";

/// Submission directory name used for imported assignments.
pub const IMPORTED_SUBMISSION_DIR: &str = "submissions";

/// Extension appended to the source base name.
pub const SOURCE_SUFFIX: &str = ".c";

/// Suffix appended to the source base name for the test-history file.
pub const HISTORY_SUFFIX: &str = "-test-history.txt";

/// Hint appended when the test-history file is missing.
pub const HISTORY_HINT: &str =
    " make testを実行するとtxtファイルが作成されます(演習1の「演習課題のやり方」を参照してください)。";

/// Byte-order mark prepended to CSV exports so spreadsheet tools pick UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Default formatter executable.
pub const DEFAULT_FORMATTER: &str = "clang-format";

/// Default `--style` argument handed to the formatter.
pub const DEFAULT_FORMAT_STYLE: &str = "file";

/// Default formatter timeout in seconds.
pub const DEFAULT_FORMAT_TIMEOUT_SECS: u64 = 10;

/// Default listen address of the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5001";

/// Default root directory holding imported assignments.
pub const DEFAULT_ASSIGNMENTS_ROOT: &str = "assignments";

/// Upper bound on the uncompressed size of an imported archive.
pub const MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;
