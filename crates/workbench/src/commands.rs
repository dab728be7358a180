//! Recognised dev/preview and build commands.
//!
//! Matching is exact after trimming; `npm run dev -- --host` is not a
//! preview command.

const PREVIEW_COMMANDS: &[&str] = &[
    "npm run dev",
    "npm run start",
    "npm start",
    "npm run preview",
    "pnpm dev",
    "pnpm run dev",
    "pnpm start",
    "pnpm preview",
    "pnpm run preview",
    "yarn dev",
    "yarn start",
    "yarn preview",
    "bun dev",
    "bun run dev",
    "vite",
    "vite dev",
    "vite preview",
    "npx vite",
    "next dev",
    "npx next dev",
];

const BUILD_COMMANDS: &[&str] = &[
    "npm run build",
    "pnpm build",
    "pnpm run build",
    "yarn build",
    "bun run build",
    "vite build",
    "npx vite build",
    "next build",
    "npx next build",
];

pub fn is_preview_command(command: &str) -> bool {
    PREVIEW_COMMANDS.contains(&command.trim())
}

pub fn is_build_command(command: &str) -> bool {
    BUILD_COMMANDS.contains(&command.trim())
}
