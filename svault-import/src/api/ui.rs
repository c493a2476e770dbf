//! UI routes - HTML pages for svault-import web interface
//!
//! Vanilla HTML/CSS/JS served inline, no frontend framework. The import page
//! carries the status poller: a fixed-delay loop (chained timeouts, so a new
//! request is only issued after the previous one resolves) that stops on a
//! terminal job state or the first transport error.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(import_page))
}

/// Root page - CSV library import
async fn import_page() -> impl IntoResponse {
    Html(IMPORT_PAGE)
}

const IMPORT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>SongVault - Library Import</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 800px;
            margin: 40px auto;
            padding: 20px;
            background: #1a1a1a;
            color: #e0e0e0;
            line-height: 1.6;
        }
        h1 {
            color: #4a9eff;
            border-bottom: 2px solid #4a9eff;
            padding-bottom: 10px;
        }
        .form-group {
            margin: 20px 0;
        }
        .button {
            display: inline-block;
            padding: 10px 20px;
            background: #4a9eff;
            color: #fff;
            border: none;
            border-radius: 4px;
            font-size: 15px;
            cursor: pointer;
        }
        .button:hover { background: #3a8eef; }
        .button:disabled {
            background: #2a5a8f;
            cursor: not-allowed;
        }
        .progress-section {
            display: none;
            background: #2a2a2a;
            padding: 20px;
            border-radius: 8px;
            margin: 20px 0;
            border: 1px solid #3a3a3a;
        }
        .progress-track {
            background: #1a1a1a;
            border-radius: 6px;
            height: 24px;
            overflow: hidden;
        }
        .progress-fill {
            background: #4a9eff;
            height: 100%;
            width: 0%;
            transition: width 0.4s;
        }
        .progress-label {
            margin: 10px 0;
            font-size: 18px;
        }
        .counters {
            display: flex;
            gap: 20px;
            margin-top: 10px;
            color: #888;
        }
        .counters b { color: #e0e0e0; }
        .status-done { color: #4ade80; }
        .error {
            display: none;
            background: #3a2a2a;
            color: #ff6b6b;
            padding: 12px;
            border-radius: 4px;
            margin: 15px 0;
            border: 1px solid #5a3a3a;
        }
    </style>
</head>
<body>
    <h1>SongVault Library Import</h1>
    <p>Upload a CSV export of your music library. Rows are keyed by <code>Track URI</code>;
       duplicates are skipped and invalid rows are counted but never abort the import.</p>

    <div class="form-group">
        <input type="file" id="csv-file" accept=".csv">
        <button class="button" id="start-btn" onclick="startImport()">Start Import</button>
    </div>

    <div id="error" class="error"></div>

    <div id="progress" class="progress-section">
        <div class="progress-label">
            <span id="status-text">queued</span> &mdash; <span id="percent">0%</span>
        </div>
        <div class="progress-track"><div class="progress-fill" id="bar"></div></div>
        <div class="counters">
            <span>Processed: <b id="processed">0</b> / <b id="total">0</b></span>
            <span>Inserted: <b id="inserted">0</b></span>
            <span>Duplicates: <b id="duplicates">0</b></span>
            <span>Errors: <b id="errors">0</b></span>
        </div>
    </div>

    <script>
        const POLL_INTERVAL_MS = 1000;
        const RELOAD_DELAY_MS = 2000;

        function showError(message) {
            const box = document.getElementById('error');
            box.textContent = message;
            box.style.display = 'block';
        }

        function setControlsEnabled(enabled) {
            document.getElementById('start-btn').disabled = !enabled;
            document.getElementById('csv-file').disabled = !enabled;
        }

        function render(job) {
            document.getElementById('status-text').textContent = job.status;
            document.getElementById('percent').textContent = job.progress_percent + '%';
            document.getElementById('bar').style.width = job.progress_percent + '%';
            document.getElementById('processed').textContent = job.processed_rows;
            document.getElementById('total').textContent = job.total_rows;
            document.getElementById('inserted').textContent = job.inserted_count;
            document.getElementById('duplicates').textContent = job.duplicate_count;
            document.getElementById('errors').textContent = job.error_count;
        }

        // One request in flight at a time: the next poll is only scheduled
        // after the current response has been handled.
        async function pollStatus(jobId) {
            let job;
            try {
                const resp = await fetch('/import/status/' + jobId);
                if (!resp.ok) {
                    throw new Error('status ' + resp.status);
                }
                job = await resp.json();
            } catch (e) {
                showError('Unable to check import status.');
                setControlsEnabled(true);
                return;
            }

            render(job);

            if (job.status === 'completed') {
                document.getElementById('status-text').classList.add('status-done');
                setTimeout(() => window.location.reload(), RELOAD_DELAY_MS);
                return;
            }
            if (job.status === 'failed') {
                showError(job.error_message || 'Import failed.');
                setControlsEnabled(true);
                return;
            }

            setTimeout(() => pollStatus(jobId), POLL_INTERVAL_MS);
        }

        async function startImport() {
            const input = document.getElementById('csv-file');
            if (!input.files.length) {
                showError('Select a CSV file first.');
                return;
            }

            document.getElementById('error').style.display = 'none';
            setControlsEnabled(false);

            const form = new FormData();
            form.append('csv_file', input.files[0]);

            let result;
            try {
                const resp = await fetch('/import/upload', { method: 'POST', body: form });
                result = await resp.json();
                if (!resp.ok) {
                    const message = result.error && result.error.message;
                    showError(message || 'Upload failed.');
                    setControlsEnabled(true);
                    return;
                }
            } catch (e) {
                showError('Upload failed.');
                setControlsEnabled(true);
                return;
            }

            document.getElementById('progress').style.display = 'block';
            pollStatus(result.job_id);
        }
    </script>
</body>
</html>
"#;
